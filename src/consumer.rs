//! Consumer-side state: the target history ring buffer and the per-tick
//! queue drain a display loop runs.
//!
//! Everything here is owned by the consumer thread; workers only ever talk
//! to it through the pipeline's channels, so none of it needs locking.

use crate::messages::{PpiMessage, SpectrumFrame, SpectrumMessage, WaveformFrame};
use crate::workers::WorkerPipeline;
use std::collections::VecDeque;

/// One detected reflection: sweep angle paired with estimated range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub angle_deg: f64,
    pub distance_m: f64,
}

/// Fixed-capacity FIFO of recent targets; the oldest entry is evicted when
/// the capacity is exceeded.
#[derive(Debug, Clone)]
pub struct TargetHistory {
    items: VecDeque<Target>,
    capacity: usize,
}

impl TargetHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, target: Target) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(target);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Targets in insertion order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Target> {
        self.items.back()
    }
}

/// Processing status shown alongside the spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    /// No message received yet
    #[default]
    Idle,
    /// Capture file absent
    Waiting,
    /// Analysis in progress
    Processing,
    /// Latest frame available
    Done,
}

/// Display-side snapshot updated once per render tick.
#[derive(Debug)]
pub struct DisplayState {
    /// Last calibrated sweep angle received, degrees
    pub last_angle_deg: f64,
    pub history: TargetHistory,
    pub status: FeedStatus,
    pub last_spectrum: Option<Box<SpectrumFrame>>,
    pub last_waveform: Option<WaveformFrame>,
}

impl DisplayState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            last_angle_deg: 0.0,
            history: TargetHistory::new(history_capacity),
            status: FeedStatus::Idle,
            last_spectrum: None,
            last_waveform: None,
        }
    }

    /// Drain at most one message per queue; never blocks.
    ///
    /// An empty queue just means "nothing new this tick". Returns true when
    /// any state changed.
    pub fn poll(&mut self, pipeline: &WorkerPipeline) -> bool {
        let mut changed = false;

        if let Ok(msg) = pipeline.ppi_rx.try_recv() {
            match msg {
                PpiMessage::Sweep { angle_deg } => {
                    self.last_angle_deg = angle_deg;
                }
                PpiMessage::Target { distance_m } => {
                    // Pair the detection with the last known sweep angle
                    self.history.push(Target {
                        angle_deg: self.last_angle_deg,
                        distance_m,
                    });
                }
            }
            changed = true;
        }

        if let Ok(msg) = pipeline.spectrum_rx.try_recv() {
            match msg {
                SpectrumMessage::Waiting => self.status = FeedStatus::Waiting,
                SpectrumMessage::Processing => self.status = FeedStatus::Processing,
                SpectrumMessage::Done(frame) => {
                    self.status = FeedStatus::Done;
                    self.last_spectrum = Some(frame);
                }
            }
            changed = true;
        }

        if let Ok(frame) = pipeline.waveform_rx.try_recv() {
            self.last_waveform = Some(frame);
            changed = true;
        }

        changed
    }
}
