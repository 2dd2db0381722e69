//! Command line definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fpv_sim::HardwareProfile;

#[derive(Debug, Parser)]
#[command(name = "fpvcfg", version, about = "Inspect and repair FPV radio link configuration")]
pub struct Cli {
    /// Model file to operate on (overrides the settings file)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Use simulated hardware instead of the real buses and radios
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Hardware build to simulate
    #[arg(
        long,
        value_name = "PROFILE",
        default_value = "vehicle",
        value_parser = parse_profile,
        global = true
    )]
    pub profile: HardwareProfile,

    /// JSON file with the radios present on this system
    #[arg(long, value_name = "JSON", global = true)]
    pub hardware: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the model
    Show {
        /// Print the whole model as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the radio links from the hardware
    Populate,
    /// Repair link assignments after a hardware change
    Reconcile,
    /// Run the validation pass and save the result
    Validate,
    /// Swap the links of the two high capacity radios
    Swap,
    /// Shift every radio link one slot forward
    Rotate,
    /// Select the relay link (1-based) or turn relaying off
    Relay {
        #[arg(value_parser = parse_relay)]
        link: RelayTarget,
    },
    /// Scan the I2C buses and refresh the device settings
    ScanBus,
    /// List the stored bus device settings
    Devices,
    /// List serial ports
    Ports,
    /// Look for a SiK radio on a serial port
    ProbeSik {
        port: String,
        /// Only try this baud rate
        #[arg(long)]
        baud: Option<u32>,
    },
}

/// Argument of the `relay` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTarget {
    Off,
    /// Zero-based link index
    Link(usize),
}

fn parse_profile(value: &str) -> Result<HardwareProfile, String> {
    HardwareProfile::from_name(value).ok_or_else(|| {
        let names: Vec<&str> = HardwareProfile::ALL.iter().map(|p| p.name()).collect();
        format!("unknown profile `{}` (expected one of: {})", value, names.join(", "))
    })
}

fn parse_relay(value: &str) -> Result<RelayTarget, String> {
    if value.eq_ignore_ascii_case("off") {
        return Ok(RelayTarget::Off);
    }
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(RelayTarget::Link(n - 1)),
        _ => Err(format!("expected a link number from 1 or `off`, got `{}`", value)),
    }
}
