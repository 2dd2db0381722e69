//! FPV Hardware Simulation Library
//!
//! This crate provides a simulation layer for exercising device discovery
//! and radio configuration without physical hardware. It includes:
//!
//! - **VirtualExtender**: Answers the extender protocol with CRC-checked frames
//! - **VirtualBus**: Simulated I2C buses usable as both scan probe and transport
//! - **HardwareProfile**: Canned radio and bus layouts for common builds
//!
//! # Example
//!
//! ```rust
//! use fpv_detect::{BoardClass, DetectionCache, DeviceRegistry};
//! use fpv_sim::{VirtualBus, VirtualExtender};
//!
//! let bus = VirtualBus::new();
//! bus.add_device(1, 0x40);
//! bus.add_extender(1, VirtualExtender::new(0x62, "Knob"));
//!
//! let dir = std::env::temp_dir().join("fpv-sim-doc");
//! let mut registry = DeviceRegistry::new(dir.join("devices.cfg"));
//! let mut cache = DetectionCache::new();
//! registry.enumerate(&mut cache, &mut bus.clone(), &mut bus.clone(), BoardClass::Generic);
//!
//! assert!(registry.has_device(0x62));
//! ```

pub mod bus;
pub mod extender;
pub mod hardware;

pub use bus::VirtualBus;
pub use extender::{VirtualExtender, VirtualExtenderConfig};
pub use hardware::HardwareProfile;
