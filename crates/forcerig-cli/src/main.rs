//! # ForceRig CLI
//!
//! Operator tool for the magnet force measurement rig.
//!
//! ```bash
//! forcerig ports
//! forcerig up --duration 2
//! forcerig monitor -z --fir-order 4
//! forcerig calibrate --nsamples 50
//! forcerig write-calibration --matrix "0.01,0.01,0.01,0.01;0,0,0,0"
//! forcerig -v pull
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forcerig_core::config::RigConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Force measurement rig control
#[derive(Parser, Debug)]
#[command(name = "forcerig")]
#[command(about = "Control the magnet force measurement rig", long_about = None)]
#[command(version)]
struct Cli {
    /// More output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON rig configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    Ports,

    /// Raise the arm, then stop
    Up {
        /// Step driver port
        #[arg(long)]
        port: Option<String>,

        /// Seconds to move before stopping
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
    },

    /// Lower the arm, then stop
    Down {
        /// Step driver port
        #[arg(long)]
        port: Option<String>,

        /// Seconds to move before stopping
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
    },

    /// Stop the arm
    Stop {
        /// Step driver port
        #[arg(long)]
        port: Option<String>,
    },

    /// Stream digitizer readings
    Monitor {
        /// Digitizer port
        #[arg(long)]
        port: Option<String>,

        /// Seconds to stream; runs until Ctrl-C when omitted
        #[arg(long)]
        duration: Option<f64>,

        /// Moving average depth applied to the forces
        #[arg(short, long)]
        fir_order: Option<usize>,

        /// Tare at startup: measure and subtract the zero bias
        #[arg(short = 'z', long)]
        calibrate_zero_bias: bool,

        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Calibrate the strain gauges against known forces and write the result
    Calibrate {
        /// Digitizer port
        #[arg(long)]
        port: Option<String>,

        /// ADC samples averaged per calibration point
        #[arg(short, long, default_value_t = 100)]
        nsamples: usize,
    },

    /// Write a calibration matrix and wait until the digitizer reports it
    WriteCalibration {
        /// Digitizer port
        #[arg(long)]
        port: Option<String>,

        /// Two rows of four coefficients, e.g. "a,b,c,d;e,f,g,h"
        #[arg(long)]
        matrix: String,
    },

    /// Pull the plate until it detaches and report the peak force
    Pull {
        /// Digitizer port
        #[arg(long)]
        force_port: Option<String>,

        /// Step driver port
        #[arg(long)]
        drive_port: Option<String>,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 30.0)]
        duration: f64,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RigConfig> {
    match path {
        Some(path) => RigConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RigConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Ports => commands::ports(),

        Commands::Up { port, duration } => {
            override_port(&mut config.drive_port, port);
            commands::move_arm(&config, commands::Direction::Up, duration).await
        }

        Commands::Down { port, duration } => {
            override_port(&mut config.drive_port, port);
            commands::move_arm(&config, commands::Direction::Down, duration).await
        }

        Commands::Stop { port } => {
            override_port(&mut config.drive_port, port);
            commands::stop(&config).await
        }

        Commands::Monitor {
            port,
            duration,
            fir_order,
            calibrate_zero_bias,
            json,
        } => {
            override_port(&mut config.force_port, port);
            if let Some(depth) = fir_order {
                config.filter_depth = depth;
            }
            commands::monitor(&config, duration, calibrate_zero_bias, json).await
        }

        Commands::Calibrate { port, nsamples } => {
            override_port(&mut config.force_port, port);
            commands::calibrate(&config, nsamples).await
        }

        Commands::WriteCalibration { port, matrix } => {
            override_port(&mut config.force_port, port);
            let cal = commands::parse_matrix(&matrix)?;
            commands::write_calibration(&config, &cal).await
        }

        Commands::Pull {
            force_port,
            drive_port,
            duration,
        } => {
            override_port(&mut config.force_port, force_port);
            override_port(&mut config.drive_port, drive_port);
            commands::pull(&config, duration).await
        }
    }
}

fn override_port(target: &mut String, port: Option<String>) {
    if let Some(port) = port {
        *target = port;
    }
}
