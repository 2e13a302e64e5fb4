//! Worker threads and the queues gluing the pipeline together.
//!
//! Three independent loops run until a shared stop flag is set: the angle
//! worker blocks on serial reads (with a timeout so the flag is observed),
//! and the spectrum and waveform workers poll the capture file's
//! modification time on their own cadences. Workers share nothing but the
//! channels; the consumer side drains them with `try_recv` per tick.

use crate::angle::AngleSynchronizer;
use crate::config::{AppConfig, SerialConfig};
use crate::decoder::{read_capture, DecodeOutcome};
use crate::error::{SerialError, WorkerError};
use crate::messages::{PpiMessage, SpectrumFrame, SpectrumMessage, WaveformFrame};
use crate::metrics::PipelineMetrics;
use crate::range::DistanceEstimator;
use crate::spectrum::SpectrumAnalyzer;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

/// Result of one capture-file poll.
#[derive(Debug, PartialEq, Eq)]
pub enum FilePoll {
    /// File absent or unreadable; `first_notice` is true only on the first
    /// poll of an absence episode
    Missing { first_notice: bool },
    /// Present but modification time unchanged
    Unchanged,
    /// Modification time changed since the last poll
    Changed,
}

/// Tracks the capture file's modification time across polls.
///
/// Change detection goes by mtime, never content hashing: the acquisition
/// process rewrites the file in place and readers must pick up every
/// rewrite cheaply.
#[derive(Debug, Default)]
pub struct FileWatcher {
    last_modified: Option<SystemTime>,
    missing: bool,
}

impl FileWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll(&mut self, path: &Path) -> FilePoll {
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => {
                self.missing = false;
                if self.last_modified != Some(mtime) {
                    self.last_modified = Some(mtime);
                    FilePoll::Changed
                } else {
                    FilePoll::Unchanged
                }
            }
            Err(_) => {
                let first_notice = !self.missing;
                self.missing = true;
                FilePoll::Missing { first_notice }
            }
        }
    }
}

/// One complete text line from the angle feed.
///
/// Seam for the angle worker: production uses a serial port, tests feed
/// scripted lines.
pub trait LineSource {
    /// `Ok(None)` means a read timeout with no complete line buffered; the
    /// caller uses it to re-check the stop flag.
    fn read_line(&mut self) -> Result<Option<String>, SerialError>;
}

/// [`LineSource`] backed by a serial port.
pub struct SerialLineSource {
    port: Box<dyn serialport::SerialPort>,
    pending: Vec<u8>,
}

impl SerialLineSource {
    pub fn open(cfg: &SerialConfig) -> Result<Self, SerialError> {
        let port = serialport::new(&cfg.port, cfg.baud)
            .timeout(cfg.timeout())
            .open()
            .map_err(|source| SerialError::OpenFailed {
                port: cfg.port.clone(),
                source,
            })?;

        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

impl LineSource for SerialLineSource {
    fn read_line(&mut self) -> Result<Option<String>, SerialError> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(Some(line));
        }

        let mut buf = [0u8; 256];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(self.take_buffered_line())
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(source) => Err(SerialError::ReadFailed { source }),
        }
    }
}

/// Sleep in short slices so the stop flag is observed promptly.
fn sleep_with_stop(duration: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
        thread::sleep(slice.min(deadline.saturating_duration_since(Instant::now())));
    }
}

/// Read angle lines from one connection until stop, disconnect, or a read
/// error. Returns true when the caller should reconnect.
fn pump_angle_lines(
    source: &mut dyn LineSource,
    sync: &mut AngleSynchronizer,
    ppi_tx: &Sender<PpiMessage>,
    stop: &AtomicBool,
    metrics: &PipelineMetrics,
) -> bool {
    while !stop.load(Ordering::Relaxed) {
        match source.read_line() {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line.parse::<f64>() {
                    Ok(raw) => {
                        metrics.record_serial_line(true);
                        if let Some(angle_deg) = sync.feed(raw) {
                            if ppi_tx.send(PpiMessage::Sweep { angle_deg }).is_err() {
                                return false;
                            }
                        }
                    }
                    Err(_) => {
                        metrics.record_serial_line(false);
                        tracing::warn!(line, "dropping malformed angle line");
                    }
                }
            }
            // Timeout: loop around and re-check the stop flag
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "serial read failed, reconnecting");
                return true;
            }
        }
    }
    false
}

fn run_angle_worker(
    cfg: SerialConfig,
    ppi_tx: Sender<PpiMessage>,
    stop: Arc<AtomicBool>,
    metrics: Arc<PipelineMetrics>,
) {
    let mut sync = AngleSynchronizer::new(cfg.angle_eps_deg);

    while !stop.load(Ordering::Relaxed) {
        match SerialLineSource::open(&cfg) {
            Ok(mut source) => {
                tracing::info!(port = %cfg.port, baud = cfg.baud, "serial angle feed connected");
                // Stale baselines from the previous connection must not
                // skew the first sweep
                sync.reset();

                if !pump_angle_lines(&mut source, &mut sync, &ppi_tx, &stop, &metrics) {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "serial connect failed, retrying");
            }
        }

        sleep_with_stop(cfg.reconnect_backoff(), &stop);
    }
}

fn run_spectrum_worker(
    config: AppConfig,
    fft_tx: Sender<SpectrumMessage>,
    ppi_tx: Sender<PpiMessage>,
    stop: Arc<AtomicBool>,
    metrics: Arc<PipelineMetrics>,
) {
    let sample_rate_hz = config.acquisition.sample_rate_hz;
    let mut analyzer = SpectrumAnalyzer::from_config(&config.spectrum, sample_rate_hz);
    let estimator = DistanceEstimator::from_config(&config.detection);
    let mut watcher = FileWatcher::new();
    let path = config.acquisition.capture_path.as_path();
    let interval = config.worker.spectrum_poll_interval();

    while !stop.load(Ordering::Relaxed) {
        match watcher.poll(path) {
            FilePoll::Missing { first_notice } => {
                metrics.record_decode_miss();
                if first_notice {
                    tracing::info!(path = %path.display(), "waiting for capture file");
                    if fft_tx.send(SpectrumMessage::Waiting).is_err() {
                        break;
                    }
                }
            }
            FilePoll::Unchanged => {}
            FilePoll::Changed => {
                if fft_tx.send(SpectrumMessage::Processing).is_err() {
                    break;
                }

                let started = Instant::now();
                match read_capture(path) {
                    // File disappeared between poll and read; next cycle
                    DecodeOutcome::Missing => metrics.record_decode_miss(),
                    // Mid-write snapshot with no samples yet; keep the
                    // consumer's last good frame and retry next cycle
                    DecodeOutcome::Frame(pair) if pair.is_empty() => {
                        metrics.record_decode_miss();
                    }
                    DecodeOutcome::Frame(pair) => {
                        let frame = SpectrumFrame::from_channels(
                            &pair,
                            &mut analyzer,
                            &config.detection,
                            sample_rate_hz,
                        );
                        let distance =
                            estimator.estimate(&frame.ch1.metrics.peak, &frame.ch2.metrics.peak);
                        metrics.record_analysis(started.elapsed());

                        tracing::debug!(
                            n_samples = frame.n_samples,
                            peak_khz = frame.ch1.metrics.peak.freq_khz,
                            "capture frame analyzed"
                        );

                        if fft_tx.send(SpectrumMessage::Done(Box::new(frame))).is_err() {
                            break;
                        }

                        if let Some(distance_m) = distance {
                            metrics.record_target();
                            if ppi_tx.send(PpiMessage::Target { distance_m }).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        sleep_with_stop(interval, &stop);
    }
}

fn run_waveform_worker(
    config: AppConfig,
    wave_tx: Sender<WaveformFrame>,
    stop: Arc<AtomicBool>,
) {
    let sample_rate_hz = config.acquisition.sample_rate_hz;
    let mut watcher = FileWatcher::new();
    let path = config.acquisition.capture_path.as_path();
    let interval = config.worker.waveform_poll_interval();

    while !stop.load(Ordering::Relaxed) {
        if let FilePoll::Changed = watcher.poll(path) {
            if let DecodeOutcome::Frame(pair) = read_capture(path) {
                if !pair.is_empty()
                    && wave_tx
                        .send(WaveformFrame::from_channels(pair, sample_rate_hz))
                        .is_err()
                {
                    break;
                }
            }
        }

        sleep_with_stop(interval, &stop);
    }
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Handles to the three worker threads and the queues they feed.
pub struct WorkerPipeline {
    /// Sweep angles and target detections
    pub ppi_rx: Receiver<PpiMessage>,
    /// Spectrum analysis results and statuses
    pub spectrum_rx: Receiver<SpectrumMessage>,
    /// Raw waveform frames
    pub waveform_rx: Receiver<WaveformFrame>,

    stop: Arc<AtomicBool>,
    workers: Vec<Worker>,
    shutdown_grace: Duration,
    join_timeout: Duration,
}

impl WorkerPipeline {
    /// Start all three workers.
    pub fn spawn(
        config: AppConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> crate::error::Result<Self> {
        let (ppi_tx, ppi_rx) = unbounded();
        let (fft_tx, spectrum_rx) = unbounded();
        let (wave_tx, waveform_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(3);

        {
            let cfg = config.serial.clone();
            let tx = ppi_tx.clone();
            let stop = stop.clone();
            let metrics = metrics.clone();
            let handle = thread::Builder::new()
                .name("angle-worker".to_string())
                .spawn(move || run_angle_worker(cfg, tx, stop, metrics))?;
            workers.push(Worker {
                name: "angle-worker",
                handle,
            });
        }

        {
            let config = config.clone();
            let stop = stop.clone();
            let metrics = metrics.clone();
            let handle = thread::Builder::new()
                .name("spectrum-worker".to_string())
                .spawn(move || run_spectrum_worker(config, fft_tx, ppi_tx, stop, metrics))?;
            workers.push(Worker {
                name: "spectrum-worker",
                handle,
            });
        }

        {
            let stop = stop.clone();
            let handle = thread::Builder::new()
                .name("waveform-worker".to_string())
                .spawn(move || run_waveform_worker(config, wave_tx, stop))?;
            workers.push(Worker {
                name: "waveform-worker",
                handle,
            });
        }

        Ok(Self {
            ppi_rx,
            spectrum_rx,
            waveform_rx,
            stop,
            workers,
            shutdown_grace: Duration::from_millis(500),
            join_timeout: Duration::from_millis(2000),
        })
    }

    /// Shared stop flag; setting it stops all workers.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Configure shutdown timing from the worker config.
    pub fn with_shutdown_timing(mut self, grace: Duration, join_timeout: Duration) -> Self {
        self.shutdown_grace = grace;
        self.join_timeout = join_timeout;
        self
    }

    /// Set the stop flag and join all workers with a bounded timeout.
    ///
    /// Every worker gets its full timeout; the first straggler is reported
    /// after all joins have been attempted.
    pub fn shutdown(mut self) -> Result<(), WorkerError> {
        tracing::info!("stopping worker threads");
        self.stop.store(true, Ordering::Relaxed);
        thread::sleep(self.shutdown_grace);

        let mut straggler: Option<WorkerError> = None;
        for worker in self.workers.drain(..) {
            let deadline = Instant::now() + self.join_timeout;
            while !worker.handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(20));
            }

            if worker.handle.is_finished() {
                if worker.handle.join().is_err() {
                    tracing::error!(worker = worker.name, "worker thread panicked");
                }
            } else {
                tracing::warn!(worker = worker.name, "worker did not stop within join timeout");
                straggler.get_or_insert(WorkerError::JoinTimeout {
                    name: worker.name.to_string(),
                });
            }
        }

        match straggler {
            Some(e) => Err(e),
            None => {
                tracing::info!("all worker threads stopped");
                Ok(())
            }
        }
    }
}
