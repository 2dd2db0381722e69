//! FPV Hardware Detection Library
//!
//! Discovery of the hardware around an FPV link: devices on the shared
//! I2C buses, add-on extenders speaking the extender protocol, serial
//! ports and SiK telemetry radios.
//!
//! # Example
//!
//! ```rust,no_run
//! use fpv_detect::{
//!     BoardClass, DetectionCache, DeviceRegistry, ShellBusProbe, ShellExtenderTransport,
//! };
//!
//! let mut cache = DetectionCache::new();
//! let mut probe = ShellBusProbe::new();
//! let mut transport = ShellExtenderTransport::new();
//!
//! let mut registry = DeviceRegistry::new("/etc/fpv/i2c_devices.cfg");
//! registry.load().unwrap();
//! registry.enumerate(&mut cache, &mut probe, &mut transport, BoardClass::Generic);
//! registry.check_devices(&mut transport).unwrap();
//!
//! for record in registry.records() {
//!     println!("0x{:02X} {}", record.address, record.name);
//! }
//! ```

pub mod bus;
pub mod cache;
pub mod error;
pub mod registry;
pub mod scanner;
pub mod sik;
pub mod transport;

pub use bus::{AddressWindow, BoardClass, BusInfo, BusProbe, ScanConfig, ShellBusProbe};
pub use cache::{probe_camera_with_timeout, CameraKind, DetectionCache};
pub use error::{DetectError, SettingsError};
pub use registry::{DeviceRegistry, LoadStatus, RegistryConfig};
pub use scanner::{ScannerConfig, SerialPortInfo, SerialScanner};
pub use sik::{probe_sik_port, SikProbeConfig, SikProber, SikRadioInfo};
pub use transport::{query_extender, ExtenderTransport, ShellExtenderTransport, TransferConfig};
