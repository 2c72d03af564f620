//! Bounded hand-off of observed frames to other tasks
//!
//! Observers run inline on the pipeline tick and must not block. A
//! [`FrameTap`] forwards copies of frames through a bounded channel; when the
//! consumer falls behind the newest sample is dropped and counted.

use crate::frame::Frame;
use crate::pipeline::{Configuring, ObserverError, ObserverPoint, Pipeline};
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

pub const DEFAULT_TAP_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapSample {
    pub stage: ObserverPoint,
    pub frame: Frame,
    pub captured_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct FrameTap {
    tx: mpsc::Sender<TapSample>,
    dropped: Arc<AtomicU64>,
}

impl FrameTap {
    pub fn new(capacity: usize) -> (FrameTap, mpsc::Receiver<TapSample>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let tap = FrameTap {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (tap, rx)
    }

    /// Registers the tap at both observation points
    pub fn attach(&self, pipeline: &mut Pipeline<Configuring>) {
        let generated = self.clone();
        let transformed = self.clone();
        pipeline
            .on_generate(move |frame| generated.offer(ObserverPoint::Generated, frame))
            .on_transform(move |frame| transformed.offer(ObserverPoint::Transformed, frame));
    }

    /// Samples lost because the receiver was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn offer(&self, stage: ObserverPoint, frame: &Frame) -> Result<(), ObserverError> {
        let sample = TapSample {
            stage,
            frame: *frame,
            captured_at: Local::now(),
        };
        match self.tx.try_send(sample) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ObserverError::Closed),
        }
    }
}

/// Drains a tap into the debug log until every sender is gone
pub async fn log_samples(mut rx: mpsc::Receiver<TapSample>) -> u64 {
    let mut received = 0;
    while let Some(sample) = rx.recv().await {
        received += 1;
        debug!(
            "[{}] {:>11}: {}",
            sample.captured_at.format("%H:%M:%S%.3f"),
            sample.stage,
            sample.frame
        );
    }
    info!("Frame tap closed after {} samples", received);
    received
}
