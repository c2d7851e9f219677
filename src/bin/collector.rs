//! Thermal data collector daemon - records fixed-duration batches until Ctrl+C.
//!
//! Usage: collector [OPTIONS]
//!
//! Options:
//!   --data-dir <dir>        Where batch directories are created (default: ./data)
//!   --batch-secs <n>        Duration of one recording batch (default: 240)
//!   --period-ms <n>         Sensor sampling period (default: 500)
//!   --zoom <n>              Heatmap upscale factor (default: 8)
//!   --fps <f>               Video frame rate (default: 2.0)
//!   --min-temp <f>          Lower color-mapping bound in °C (default: 18)
//!   --max-temp <f>          Upper color-mapping bound in °C (default: 35)
//!   --seed <n>              Synthetic sensor seed (default: 0)
//!
//! Runs over the synthetic sensor; swap in a hardware ThermalSensor
//! implementation to record from a real device.

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thermocap::pipeline::Pipeline;
use thermocap::sensor::SyntheticSensor;
use thermocap::session::SessionOptions;
use thermocap::BatchCollector;
use tokio_util::sync::CancellationToken;

struct Args {
    data_dir: PathBuf,
    batch_secs: u64,
    period_ms: u64,
    zoom: usize,
    fps: f64,
    min_temp: f32,
    max_temp: f32,
    seed: u64,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();

    let mut data_dir = PathBuf::from("./data");
    let mut batch_secs = 240u64;
    let mut period_ms = 500u64;
    let mut zoom = 8usize;
    let mut fps = 2.0f64;
    let mut min_temp = 18.0f32;
    let mut max_temp = 35.0f32;
    let mut seed = 0u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" if i + 1 < args.len() => {
                data_dir = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--batch-secs" if i + 1 < args.len() => {
                batch_secs = args[i + 1].parse().ok()?;
                i += 2;
            }
            "--period-ms" if i + 1 < args.len() => {
                period_ms = args[i + 1].parse().ok()?;
                i += 2;
            }
            "--zoom" if i + 1 < args.len() => {
                zoom = args[i + 1].parse().ok()?;
                i += 2;
            }
            "--fps" if i + 1 < args.len() => {
                fps = args[i + 1].parse().ok()?;
                i += 2;
            }
            "--min-temp" if i + 1 < args.len() => {
                min_temp = args[i + 1].parse().ok()?;
                i += 2;
            }
            "--max-temp" if i + 1 < args.len() => {
                max_temp = args[i + 1].parse().ok()?;
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                seed = args[i + 1].parse().ok()?;
                i += 2;
            }
            "--help" | "-h" => return None,
            other => {
                eprintln!("Error: unknown argument '{}'", other);
                return None;
            }
        }
    }

    Some(Args {
        data_dir,
        batch_secs,
        period_ms,
        zoom,
        fps,
        min_temp,
        max_temp,
        seed,
    })
}

fn print_usage() {
    eprintln!("Usage: collector [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --data-dir <dir>   Where batch directories are created (default: ./data)");
    eprintln!("  --batch-secs <n>   Duration of one recording batch (default: 240)");
    eprintln!("  --period-ms <n>    Sensor sampling period (default: 500)");
    eprintln!("  --zoom <n>         Heatmap upscale factor (default: 8)");
    eprintln!("  --fps <f>          Video frame rate (default: 2.0)");
    eprintln!("  --min-temp <f>     Lower color-mapping bound in °C (default: 18)");
    eprintln!("  --max-temp <f>     Upper color-mapping bound in °C (default: 35)");
    eprintln!("  --seed <n>         Synthetic sensor seed (default: 0)");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("thermocap=info".parse()?)
                .add_directive("collector=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let Some(args) = parse_args() else {
        print_usage();
        return Ok(());
    };

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received, finishing in-flight batch...");
        cancel_clone.cancel();
    });

    let pipeline = Pipeline::builder()
        .sample_period(Duration::from_millis(args.period_ms))
        .zoom(args.zoom)
        .session_options(SessionOptions {
            min_temp: args.min_temp,
            max_temp: args.max_temp,
            fps: args.fps,
            jpeg_quality: 90,
        })
        .start(SyntheticSensor::new(args.seed));

    let mut collector = BatchCollector::new(pipeline, &args.data_dir)?;
    tracing::info!(
        "collecting {}s batches under {}",
        args.batch_secs,
        collector.root_dir().display()
    );

    while !cancel.is_cancelled() {
        let batch_dir = collector.start_batch()?;
        tracing::info!("recording batch '{}'", batch_dir.display());

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(args.batch_secs)) => {}
        }

        // stop_recording blocks on the queue drain; keep it off the runtime.
        collector = tokio::task::spawn_blocking(move || {
            match collector.finish_batch() {
                Ok(summary) => tracing::info!(
                    "batch complete: {} rows, {} video frames",
                    summary.rows_written,
                    summary.video_frames
                ),
                Err(e) => tracing::warn!("failed to finish batch: {}", e),
            }
            collector
        })
        .await?;
    }

    tokio::task::spawn_blocking(move || collector.shutdown()).await??;
    tracing::info!("collector exited cleanly");
    Ok(())
}
