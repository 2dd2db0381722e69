//! FPV Radio Configuration Tool
//!
//! Command line front end for the vehicle model: shows and repairs the
//! radio link assignment, scans the I2C buses for add-on devices and probes
//! serial ports for SiK radios.

mod cli;
mod commands;
mod settings;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use commands::Session;
use settings::Settings;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays clean for piping
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fpvcfg=info,fpv_protocol=info,fpv_detect=info,fpv_model=info,fpv_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load();
    // First run writes the defaults out so they can be edited
    if Settings::settings_path().is_some_and(|p| !p.exists()) {
        if let Err(e) = settings.save() {
            tracing::warn!("Could not write default settings: {:#}", e);
        }
    }
    if let Some(path) = &cli.config {
        settings.model_path = path.clone();
    }
    if cli.simulate {
        tracing::info!("Simulating {} hardware", cli.profile.name());
    }

    let session = Session::new(settings, cli.simulate, cli.profile, cli.hardware.as_deref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    session.run(&cli.command, &mut out)
}
