//! Subcommand implementations

use anyhow::{bail, Context, Result};
use forcerig_core::config::RigConfig;
use forcerig_core::device::{Calibration, Digitizer, StepDrive, CHANNEL_COUNT};
use forcerig_core::force::{
    average_adc, fit_line, ForceError, ForceSensor, PullMonitor, PullState,
    CALIBRATION_SAMPLE_TIMEOUT, MIN_FIT_POINTS,
};
use forcerig_core::protocol::{list_ports, ProtocolError};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{self, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Positive number of seconds
fn seconds(value: f64) -> Result<Duration> {
    if !(value > 0.0) {
        bail!("Duration must be positive, got {}", value);
    }
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid duration: {}", value))
}

fn open_drive(config: &RigConfig) -> Result<StepDrive> {
    let drive = StepDrive::open(&config.drive_port, config.baud_rate)
        .with_context(|| format!("Failed to open step driver on {}", config.drive_port))?;
    Ok(drive.with_timing(config.command_timing()))
}

fn open_digitizer(config: &RigConfig) -> Result<Digitizer> {
    let digitizer = Digitizer::open(&config.force_port, config.baud_rate)
        .with_context(|| format!("Failed to open digitizer on {}", config.force_port))?;
    Ok(digitizer.with_timing(config.calibration_timing()))
}

pub fn ports() -> Result<()> {
    let ports = list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port.label());
    }
    Ok(())
}

pub async fn move_arm(config: &RigConfig, direction: Direction, duration: f64) -> Result<()> {
    let duration = seconds(duration)?;
    let mut drive = open_drive(config)?;
    match direction {
        Direction::Up => drive.up().await?,
        Direction::Down => drive.down().await?,
    }
    time::sleep(duration).await;
    drive.stop().await?;
    drive.close().await?;
    Ok(())
}

pub async fn stop(config: &RigConfig) -> Result<()> {
    let mut drive = open_drive(config)?;
    drive.stop().await?;
    drive.close().await?;
    Ok(())
}

pub async fn monitor(
    config: &RigConfig,
    duration: Option<f64>,
    tare: bool,
    json: bool,
) -> Result<()> {
    let end = duration.map(seconds).transpose()?.map(|d| Instant::now() + d);
    let mut sensor = ForceSensor::new(open_digitizer(config)?, config.filter_depth);
    if tare {
        let bias = sensor.calibrate_bias(config.bias_samples).await?;
        println!("Zero bias: {:.3?} N", bias);
    } else {
        sensor.skip_bias().await?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let timeout = match end {
            Some(end) => {
                let remaining = end.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                remaining.min(ForceSensor::SAMPLE_TIMEOUT)
            }
            None => ForceSensor::SAMPLE_TIMEOUT,
        };

        let sample = tokio::select! {
            _ = &mut ctrl_c => break,
            sample = sensor.read_sample(timeout) => sample,
        };
        let sample = match sample {
            Ok(sample) => sample,
            Err(ForceError::Protocol(ProtocolError::Timeout)) => {
                warn!("No reading from {}", config.force_port);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if json {
            let line = json!({
                "seq_num": sample.seq_num,
                "forces": sample.forces,
                "total": sample.total,
                "peak": sensor.peak_force(),
            });
            println!("{}", line);
        } else {
            let breakdown: String = sample.forces.iter().map(|f| format!("{:+08.1}", f)).collect();
            println!(
                "#{:06}: F = {:+08.1} N = {} F_peak = {:+08.1} N",
                sample.seq_num,
                sample.total,
                breakdown,
                sensor.peak_force()
            );
        }
    }

    sensor.close().await?;
    Ok(())
}

/// Parse "a,b,c,d;e,f,g,h" into a calibration matrix
pub fn parse_matrix(text: &str) -> Result<Calibration> {
    let rows: Vec<&str> = text.split(';').collect();
    if rows.len() != 2 {
        bail!("Expected 2 rows separated by ';', got {}", rows.len());
    }

    let mut matrix = [[0.0; CHANNEL_COUNT]; 2];
    for (row, (out, text)) in matrix.iter_mut().zip(rows).enumerate() {
        let values = text
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .with_context(|| format!("Invalid coefficient '{}' in row {}", v.trim(), row))
            })
            .collect::<Result<Vec<_>>>()?;
        if values.len() != CHANNEL_COUNT {
            bail!(
                "Row {} has {} coefficients, expected {}",
                row,
                values.len(),
                CHANNEL_COUNT
            );
        }
        out.copy_from_slice(&values);
    }
    Ok(Calibration(matrix))
}

/// Inverse of [`parse_matrix`]
pub fn format_matrix(cal: &Calibration) -> String {
    cal.0
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join(";")
}

pub async fn write_calibration(config: &RigConfig, cal: &Calibration) -> Result<()> {
    let mut digitizer = open_digitizer(config)?;
    digitizer.write_calibration_until_confirmed(cal).await?;
    println!("Calibration confirmed");
    digitizer.close().await?;
    Ok(())
}

/// Fit every channel from operator-entered known loads and write the result
pub async fn calibrate(config: &RigConfig, n_samples: usize) -> Result<()> {
    if n_samples == 0 {
        bail!("Number of samples must be positive");
    }
    let mut digitizer = open_digitizer(config)?;
    digitizer.flush().await?;
    let current = digitizer
        .fetch(CALIBRATION_SAMPLE_TIMEOUT)
        .await
        .context("Timed out waiting for the digitizer")?;
    let mut cal = current.calibration;
    println!("Original calibration: {}", format_matrix(&cal));

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    for ch in 0..CHANNEL_COUNT {
        println!(
            "Calibrating channel #{}. Load its strain gauge with known forces, one of them \
             without load; at least {} points are needed.",
            ch, MIN_FIT_POINTS
        );
        let mut points = Vec::new();
        loop {
            print!("Force [N] on channel #{}, or nothing to finish: ", ch);
            std::io::stdout().flush()?;
            let Some(line) = input.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let force: f64 = match line.parse() {
                Ok(force) => force,
                Err(_) => {
                    eprintln!("Not a number: {}", line);
                    continue;
                }
            };
            let adc = average_adc(&mut digitizer, ch, n_samples).await?;
            println!("ADC {:.1} -> {:.1} N", adc, force);
            points.push((adc, force));
        }

        match fit_line(&points) {
            Some(coefficients) => cal.set_channel(ch, coefficients),
            None => warn!(
                "Channel #{} not calibrated: {} points, at least {} distinct ones needed",
                ch,
                points.len(),
                MIN_FIT_POINTS
            ),
        }
        println!("Channel #{} coefficients: {:?}", ch, cal.channel(ch));
    }

    for ch in cal.zero_invalid_channels() {
        warn!("Channel #{} has invalid coefficients, replaced with zeros", ch);
    }
    println!("New calibration: {}", format_matrix(&cal));
    println!("Writing calibration, this may take a few seconds...");
    digitizer.write_calibration_until_confirmed(&cal).await?;
    println!("Calibration confirmed");
    digitizer.close().await?;
    Ok(())
}

pub async fn pull(config: &RigConfig, duration: f64) -> Result<()> {
    let duration = seconds(duration)?;
    let mut drive = open_drive(config)?;
    let mut sensor = ForceSensor::new(open_digitizer(config)?, config.filter_depth);

    drive.stop().await?;
    sensor.calibrate_bias(config.bias_samples).await?;
    sensor.reset_peak();

    let mut monitor = PullMonitor::new(config.detach_threshold);
    drive.up().await?;
    let outcome = watch_pull(&mut sensor, &mut monitor, Instant::now() + duration).await;
    drive.stop().await?;

    match outcome? {
        PullState::Detached => println!("Plate detached"),
        state => warn!("Pull ended without detachment ({:?})", state),
    }
    println!("Positive peak: {:.3} N", monitor.positive_peak());
    println!("Absolute peak: {:.3} N", monitor.absolute_peak());

    drive.close().await?;
    sensor.close().await?;
    Ok(())
}

async fn watch_pull(
    sensor: &mut ForceSensor,
    monitor: &mut PullMonitor,
    deadline: Instant,
) -> Result<PullState> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while Instant::now() < deadline {
        let force = tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            force = sensor.read_instant_force(ForceSensor::SAMPLE_TIMEOUT) => force?,
        };
        let state = monitor.update(force);
        info!("Force {:.3} N, {:?}", force, state);
        if state == PullState::Detached {
            break;
        }
    }
    Ok(monitor.state())
}
