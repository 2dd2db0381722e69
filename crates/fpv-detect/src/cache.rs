//! Process-wide detection results
//!
//! Board type, vehicle role, camera type and the bus list are detected once
//! per run. The cache is owned by the caller and passed by reference; each
//! slot is filled by the first caller that asks for it.

use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bus::{BoardClass, BusInfo};

/// Camera kinds reported by the camera probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraKind {
    #[default]
    Unknown,
    None,
    Csi,
    Hdmi,
    Veye,
    Usb,
}

/// First-call-wins cache of hardware detection results
#[derive(Debug, Clone, Default)]
pub struct DetectionCache {
    board: Option<BoardClass>,
    is_vehicle: Option<bool>,
    camera: Option<CameraKind>,
    buses: Option<Vec<BusInfo>>,
}

impl DetectionCache {
    /// An empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Board class, detected on first use
    pub fn board_or_detect(&mut self, detect: impl FnOnce() -> BoardClass) -> BoardClass {
        *self.board.get_or_insert_with(detect)
    }

    /// Vehicle role, detected on first use
    pub fn is_vehicle_or_detect(&mut self, detect: impl FnOnce() -> bool) -> bool {
        *self.is_vehicle.get_or_insert_with(detect)
    }

    /// Camera kind, detected on first use
    pub fn camera_or_detect(&mut self, detect: impl FnOnce() -> CameraKind) -> CameraKind {
        *self.camera.get_or_insert_with(detect)
    }

    /// Bus list, enumerated on first use
    pub fn buses_or_enumerate(&mut self, enumerate: impl FnOnce() -> Vec<BusInfo>) -> &[BusInfo] {
        self.buses.get_or_insert_with(enumerate)
    }

    /// Cached bus list, if enumeration already ran
    pub fn buses(&self) -> Option<&[BusInfo]> {
        self.buses.as_deref()
    }

    /// Mutable access to the cached bus list
    pub fn buses_mut(&mut self) -> Option<&mut Vec<BusInfo>> {
        self.buses.as_mut()
    }

    /// Forget the bus list so the next request rescans
    pub fn invalidate_buses(&mut self) {
        self.buses = None;
    }

    /// Cached board class without detecting
    pub fn board(&self) -> Option<BoardClass> {
        self.board
    }

    /// Cached vehicle role without detecting
    pub fn is_vehicle(&self) -> Option<bool> {
        self.is_vehicle
    }

    /// Cached camera kind without detecting
    pub fn camera(&self) -> Option<CameraKind> {
        self.camera
    }
}

/// Run a blocking camera probe with a hard deadline
///
/// The probe runs on its own thread. If it has not answered when the
/// timeout expires, `CameraKind::Unknown` is returned and the thread is
/// left to finish on its own.
pub fn probe_camera_with_timeout<F>(probe: F, timeout: Duration) -> CameraKind
where
    F: FnOnce() -> CameraKind + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("camera-probe".to_string())
        .spawn(move || {
            let _ = tx.send(probe());
        });
    if let Err(e) = spawned {
        warn!("Failed to start camera probe: {}", e);
        return CameraKind::Unknown;
    }

    match rx.recv_timeout(timeout) {
        Ok(kind) => {
            info!("Camera probe result: {:?}", kind);
            kind
        }
        Err(_) => {
            warn!("Camera probe did not answer within {:?}", timeout);
            CameraKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_wins() {
        let mut cache = DetectionCache::new();
        assert_eq!(cache.board_or_detect(|| BoardClass::Pi4), BoardClass::Pi4);
        assert_eq!(cache.board_or_detect(|| BoardClass::Generic), BoardClass::Pi4);
        assert!(cache.is_vehicle_or_detect(|| true));
        assert!(cache.is_vehicle_or_detect(|| false));
    }

    #[test]
    fn test_buses_enumerated_once() {
        let mut cache = DetectionCache::new();
        let mut calls = 0;
        cache.buses_or_enumerate(|| {
            calls += 1;
            vec![BusInfo::new(1)]
        });
        cache.buses_or_enumerate(|| {
            calls += 1;
            Vec::new()
        });
        assert_eq!(calls, 1);
        assert_eq!(cache.buses().map(|b| b.len()), Some(1));

        cache.invalidate_buses();
        assert!(cache.buses().is_none());
    }

    #[test]
    fn test_camera_probe_answers() {
        let kind = probe_camera_with_timeout(|| CameraKind::Csi, Duration::from_secs(1));
        assert_eq!(kind, CameraKind::Csi);
    }

    #[test]
    fn test_camera_probe_timeout_is_unknown() {
        let kind = probe_camera_with_timeout(
            || {
                std::thread::sleep(Duration::from_millis(500));
                CameraKind::Veye
            },
            Duration::from_millis(20),
        );
        assert_eq!(kind, CameraKind::Unknown);
    }
}
