use anyhow::Context;
use clap::Parser;
use radar_scope::config::AppConfig;
use radar_scope::consumer::DisplayState;
use radar_scope::metrics::PipelineMetrics;
use radar_scope::workers::WorkerPipeline;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Radar capture acquisition and analysis pipeline")]
struct Args {
    /// Config file path (TOML); missing file falls back to defaults
    #[arg(short, long, default_value = "radar_scope.toml")]
    config: PathBuf,

    /// Override the capture file to watch
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Override the serial port for the angle feed
    #[arg(long)]
    serial_port: Option<String>,

    /// Stop after this many consumer ticks instead of running until Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config);
    if let Some(capture) = args.capture {
        config.acquisition.capture_path = capture;
    }
    if let Some(port) = args.serial_port {
        config.serial.port = port;
    }
    config.validate().context("invalid configuration")?;

    tracing::info!(
        capture = %config.acquisition.capture_path.display(),
        serial = %config.serial.port,
        sample_rate_hz = config.acquisition.sample_rate_hz,
        "starting pipeline"
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let history_capacity = config.history.capacity;
    let shutdown_grace = config.worker.shutdown_grace();
    let join_timeout = config.worker.join_timeout();

    let pipeline = WorkerPipeline::spawn(config, metrics.clone())
        .context("failed to start worker threads")?
        .with_shutdown_timing(shutdown_grace, join_timeout);

    let stop = pipeline.stop_flag();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutdown requested");
            stop.store(true, Ordering::Relaxed);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let mut state = DisplayState::new(history_capacity);
    let mut tick: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        state.poll(&pipeline);

        tick += 1;
        if tick % 600 == 0 {
            let summary = metrics.summary();
            tracing::info!(
                angle_deg = state.last_angle_deg,
                targets = state.history.len(),
                frames = summary.frames_processed,
                p99_us = summary.analysis_p99_us,
                "pipeline status"
            );
        }

        if args.ticks.is_some_and(|limit| tick >= limit) {
            break;
        }

        std::thread::sleep(Duration::from_millis(16));
    }

    if let Err(e) = pipeline.shutdown() {
        tracing::warn!(error = %e, "worker shutdown incomplete");
    }

    let summary = metrics.summary();
    tracing::info!(
        frames = summary.frames_processed,
        targets = summary.targets_detected,
        decode_misses = summary.decode_misses,
        serial_ok = summary.serial_lines_ok,
        serial_bad = summary.serial_lines_bad,
        p50_us = summary.analysis_p50_us,
        p99_us = summary.analysis_p99_us,
        uptime_secs = format!("{:.1}", summary.uptime_secs),
        "pipeline stopped"
    );

    Ok(())
}
