//! Virtual I2C buses
//!
//! A [`VirtualBus`] is a cloneable handle to a shared set of simulated
//! buses. It implements both the scan and the transfer side, so one bus can
//! be handed to the registry as probe and transport at the same time.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use fpv_detect::{AddressWindow, BusProbe, DetectError, ExtenderTransport};
use fpv_protocol::ProtocolError;
use tracing::{debug, trace};

use crate::extender::VirtualExtender;

#[derive(Debug, Default)]
struct SimBus {
    /// Plain devices that answer a scan but speak no protocol
    devices: Vec<u8>,
    extenders: Vec<VirtualExtender>,
    /// Every address in the scan window answers
    noisy: bool,
}

impl SimBus {
    fn answers(&self, address: u8) -> bool {
        self.noisy
            || self.devices.contains(&address)
            || self.extenders.iter().any(|e| e.address() == address)
    }
}

#[derive(Debug, Default)]
struct BusState {
    buses: BTreeMap<u8, SimBus>,
    scans: usize,
    transactions: usize,
}

/// Shared handle to a set of simulated buses
#[derive(Debug, Clone, Default)]
pub struct VirtualBus {
    state: Arc<Mutex<BusState>>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make a bus exist, with nothing on it
    pub fn add_bus(&self, bus: u8) {
        self.state().buses.entry(bus).or_default();
    }

    /// Place a passive device on a bus, creating the bus if needed
    pub fn add_device(&self, bus: u8, address: u8) {
        let mut state = self.state();
        let sim = state.buses.entry(bus).or_default();
        if !sim.devices.contains(&address) {
            sim.devices.push(address);
        }
    }

    /// Place an extender on a bus, creating the bus if needed
    pub fn add_extender(&self, bus: u8, extender: VirtualExtender) {
        debug!(
            "Virtual extender [{}] at 0x{:02X} on i2c-{}",
            extender.name(),
            extender.address(),
            bus
        );
        self.state()
            .buses
            .entry(bus)
            .or_default()
            .extenders
            .push(extender);
    }

    /// Make every address on a bus answer scans
    pub fn set_noisy(&self, bus: u8, noisy: bool) {
        self.state().buses.entry(bus).or_default().noisy = noisy;
    }

    /// Run a closure against the extender at an address
    pub fn with_extender<R>(
        &self,
        address: u8,
        f: impl FnOnce(&mut VirtualExtender) -> R,
    ) -> Option<R> {
        let mut state = self.state();
        state
            .buses
            .values_mut()
            .flat_map(|b| b.extenders.iter_mut())
            .find(|e| e.address() == address)
            .map(f)
    }

    /// Number of scan calls served
    pub fn scan_count(&self) -> usize {
        self.state().scans
    }

    /// Number of transfers served
    pub fn transaction_count(&self) -> usize {
        self.state().transactions
    }
}

impl BusProbe for VirtualBus {
    fn candidate_buses(&self) -> Vec<u8> {
        let mut buses = fpv_detect::bus::CANDIDATE_BUSES.to_vec();
        for &number in self.state().buses.keys() {
            if !buses.contains(&number) {
                buses.push(number);
            }
        }
        buses
    }

    fn bus_present(&self, bus: u8) -> bool {
        self.state().buses.contains_key(&bus)
    }

    fn scan(&mut self, bus: u8, window: AddressWindow) -> Result<Vec<u8>, DetectError> {
        let mut state = self.state();
        state.scans += 1;
        let sim = state.buses.get(&bus).ok_or_else(|| DetectError::CommandFailed {
            command: format!("scan i2c-{}", bus),
            reason: "no such bus".to_string(),
        })?;
        let found: Vec<u8> = (window.first..=window.last)
            .filter(|a| sim.answers(*a))
            .collect();
        trace!(
            "i2c-{} 0x{:02X}..0x{:02X}: {:02X?}",
            bus,
            window.first,
            window.last,
            found
        );
        Ok(found)
    }
}

impl ExtenderTransport for VirtualBus {
    fn transact(
        &mut self,
        bus: u8,
        address: u8,
        request: &[u8],
        response_len: usize,
    ) -> Result<Vec<u8>, DetectError> {
        let mut state = self.state();
        state.transactions += 1;
        let extender = state
            .buses
            .get_mut(&bus)
            .and_then(|b| b.extenders.iter_mut().find(|e| e.address() == address))
            .ok_or(ProtocolError::NoResponse(address))?;
        let mut reply = extender
            .handle(request)
            .ok_or(ProtocolError::NoResponse(address))?;
        reply.truncate(response_len);
        Ok(reply)
    }
}
