//! Application settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use fpv_detect::{BoardClass, ScanConfig, TransferConfig};
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Model file; the backup copy sits next to it
    pub model_path: PathBuf,
    /// Bus device settings file
    pub device_settings_path: PathBuf,
    /// Board class, narrows the scan on some boards
    #[serde(default)]
    pub board: BoardClass,
    /// Bus scan utility
    #[serde(default = "default_scan_command")]
    pub scan_command: String,
    /// Bus transfer utility
    #[serde(default = "default_transfer_command")]
    pub transfer_command: String,
    /// Time allowed per scan call, milliseconds
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_ms: u64,
    /// Time allowed per transfer, milliseconds
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_ms: u64,
    /// Baud rates tried when probing for SiK radios
    pub sik_baud_rates: Vec<u32>,
}

fn default_scan_command() -> String {
    "i2cdetect".to_string()
}

fn default_transfer_command() -> String {
    "i2ctransfer".to_string()
}

fn default_scan_timeout() -> u64 {
    2000
}

fn default_transfer_timeout() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = Self::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            model_path: data_dir.join("vehicle.mdl"),
            device_settings_path: data_dir.join("i2c_devices.cfg"),
            board: BoardClass::Generic,
            scan_command: default_scan_command(),
            transfer_command: default_transfer_command(),
            scan_timeout_ms: default_scan_timeout(),
            transfer_timeout_ms: default_transfer_timeout(),
            sik_baud_rates: vec![57600, 115200, 38400, 19200, 9600],
        }
    }
}

impl Settings {
    /// Get the XDG config directory for fpvcfg
    /// Uses $XDG_CONFIG_HOME/fpvcfg, falls back to ~/.config/fpvcfg
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("fpvcfg"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("fpvcfg"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a file, defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            command: self.scan_command.clone(),
            timeout: Duration::from_millis(self.scan_timeout_ms),
            ..ScanConfig::default()
        }
    }

    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            command: self.transfer_command.clone(),
            timeout: Duration::from_millis(self.transfer_timeout_ms),
        }
    }
}
