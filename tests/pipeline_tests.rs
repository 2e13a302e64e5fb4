use radar_scope::config::AppConfig;
use radar_scope::consumer::{DisplayState, FeedStatus};
use radar_scope::messages::{PpiMessage, SpectrumMessage};
use radar_scope::metrics::PipelineMetrics;
use radar_scope::test_fixtures::{silent_capture, sine_capture};
use radar_scope::workers::WorkerPipeline;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const SAMPLE_RATE_HZ: f64 = 1_000_000.0;
const TONE_HZ: f64 = 100_000.0;

/// Write a two-channel capture file carrying a 100 kHz tone
fn create_test_capture(n_per_channel: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&sine_capture(TONE_HZ, SAMPLE_RATE_HZ, n_per_channel))
        .unwrap();
    file.flush().unwrap();
    file
}

/// Pipeline config pointed at a capture path, tuned for fast test turnaround.
/// The serial port is intentionally bogus so the angle worker just cycles
/// through reconnect attempts.
fn test_config(capture_path: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.acquisition.capture_path = capture_path.to_path_buf();
    config.acquisition.sample_rate_hz = SAMPLE_RATE_HZ;
    config.serial.port = "/dev/nonexistent-test-port".to_string();
    config.serial.reconnect_backoff_ms = 100;
    config.worker.spectrum_poll_interval_ms = 10;
    config.worker.waveform_poll_interval_ms = 10;
    config.worker.shutdown_grace_ms = 50;
    config
}

fn spawn_pipeline(config: AppConfig) -> WorkerPipeline {
    let grace = config.worker.shutdown_grace();
    let join_timeout = config.worker.join_timeout();
    WorkerPipeline::spawn(config, Arc::new(PipelineMetrics::new()))
        .unwrap()
        .with_shutdown_timing(grace, join_timeout)
}

#[test]
fn test_pipeline_analyzes_capture_file() {
    let capture = create_test_capture(1024);
    let pipeline = spawn_pipeline(test_config(capture.path()));

    let deadline = Duration::from_secs(5);
    let mut saw_processing = false;
    let frame = loop {
        match pipeline.spectrum_rx.recv_timeout(deadline) {
            Ok(SpectrumMessage::Processing) => saw_processing = true,
            Ok(SpectrumMessage::Done(frame)) => break frame,
            Ok(SpectrumMessage::Waiting) => panic!("file exists, should never wait"),
            Err(e) => panic!("no analysis produced: {e}"),
        }
    };

    assert!(saw_processing, "Processing should precede Done");
    assert_eq!(frame.n_samples, 1024);

    // Tone lands within one bin of 100 kHz on both channels
    let bin_width_khz = SAMPLE_RATE_HZ / 1024.0 / 1000.0;
    assert!((frame.ch1.metrics.peak.freq_khz - 100.0).abs() <= bin_width_khz);
    assert!((frame.ch2.metrics.peak.freq_khz - 100.0).abs() <= bin_width_khz);

    pipeline.shutdown().expect("workers should stop cleanly");
}

#[test]
fn test_pipeline_emits_target_for_strong_tone() {
    let capture = create_test_capture(1024);
    let config = test_config(capture.path());
    let max_range = config.detection.max_range_m;
    let pipeline = spawn_pipeline(config);

    match pipeline.ppi_rx.recv_timeout(Duration::from_secs(5)) {
        Ok(PpiMessage::Target { distance_m }) => {
            assert!(distance_m > 1.0);
            assert!(distance_m <= max_range);
        }
        Ok(other) => panic!("unexpected ppi message {other:?}"),
        Err(e) => panic!("no target produced: {e}"),
    }

    pipeline.shutdown().expect("workers should stop cleanly");
}

#[test]
fn test_silent_capture_produces_no_target() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&silent_capture(512)).unwrap();
    file.flush().unwrap();

    let pipeline = spawn_pipeline(test_config(file.path()));

    let frame = loop {
        match pipeline.spectrum_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(SpectrumMessage::Done(frame)) => break frame,
            Ok(_) => continue,
            Err(e) => panic!("no analysis produced: {e}"),
        }
    };

    // DC removal zeroes the signal; every bin clamps to the 0 dB floor
    assert!(frame.ch1.spectrum.magnitude_db.iter().all(|&m| m == 0.0));
    assert!(frame.ch1.metrics.peaks.is_empty());

    // Zero peak metrics never clear the distance threshold
    assert!(pipeline
        .ppi_rx
        .recv_timeout(Duration::from_millis(300))
        .is_err());

    pipeline.shutdown().expect("workers should stop cleanly");
}

#[test]
fn test_empty_capture_file_publishes_no_frame() {
    // A zero-byte file is the mid-write window of the acquisition process
    let file = NamedTempFile::new().unwrap();
    let pipeline = spawn_pipeline(test_config(file.path()));

    // Processing may be announced, but no Done frame (which would wipe the
    // consumer's last good spectrum) and no target
    let deadline = Instant::now() + Duration::from_millis(500);
    while Instant::now() < deadline {
        match pipeline.spectrum_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(SpectrumMessage::Processing) | Err(_) => {}
            Ok(other) => panic!("expected no frame from an empty file, got {other:?}"),
        }
    }
    assert!(pipeline.ppi_rx.try_recv().is_err());

    pipeline.shutdown().expect("workers should stop cleanly");
}

#[test]
fn test_missing_capture_reports_waiting_once() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = spawn_pipeline(test_config(&dir.path().join("never-written.bin")));

    match pipeline.spectrum_rx.recv_timeout(Duration::from_secs(5)) {
        Ok(SpectrumMessage::Waiting) => {}
        Ok(other) => panic!("expected Waiting, got {other:?}"),
        Err(e) => panic!("no status produced: {e}"),
    }

    // Absence is announced once, not on every poll cycle
    assert!(pipeline
        .spectrum_rx
        .recv_timeout(Duration::from_millis(300))
        .is_err());

    pipeline.shutdown().expect("workers should stop cleanly");
}

#[test]
fn test_display_state_reaches_done_with_target() {
    let capture = create_test_capture(1024);
    let pipeline = spawn_pipeline(test_config(capture.path()));
    let mut state = DisplayState::new(50);

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        state.poll(&pipeline);
        if state.status == FeedStatus::Done && !state.history.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(state.status, FeedStatus::Done);
    assert!(state.last_spectrum.is_some());
    assert!(state.last_waveform.is_some());

    let target = state.history.latest().expect("target should be recorded");
    // No sweep angle ever arrived, so the detection pairs with 0°
    assert_eq!(target.angle_deg, 0.0);
    assert!(target.distance_m > 1.0);

    pipeline.shutdown().expect("workers should stop cleanly");
}

#[test]
fn test_shutdown_is_bounded() {
    let capture = create_test_capture(256);
    let pipeline = spawn_pipeline(test_config(capture.path()));

    let started = Instant::now();
    pipeline.shutdown().expect("workers should stop cleanly");
    assert!(
        started.elapsed() < Duration::from_secs(8),
        "shutdown should finish within grace + join timeout"
    );
}
