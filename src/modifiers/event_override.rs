//! Override driven by external directional events
//!
//! An external source (chat bot, script, stdin) pushes [`DirectionalEvent`]s
//! into a bounded queue. The modifier consumes at most one event per tick and
//! nudges the left stick horizontally. The producer never blocks: when the
//! queue is full the newest event is dropped.

use crate::frame::{Axis, Frame};
use crate::pipeline::Modifier;
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_QUEUE_SIZE: usize = 50;
pub const DEFAULT_STEP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionalEvent {
    Left,
    Right,
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown directional event: {0:?}")]
pub struct ParseEventError(String);

impl FromStr for DirectionalEvent {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(DirectionalEvent::Left),
            "right" => Ok(DirectionalEvent::Right),
            other => Err(ParseEventError(other.to_string())),
        }
    }
}

impl Display for DirectionalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionalEvent::Left => write!(f, "left"),
            DirectionalEvent::Right => write!(f, "right"),
        }
    }
}

/// Producer side of the override queue
#[derive(Debug, Clone)]
pub struct OverrideSender {
    tx: mpsc::Sender<DirectionalEvent>,
}

impl OverrideSender {
    /// Queues an event; returns false when it was dropped
    pub fn push(&self, event: DirectionalEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!("Override queue full, dropping {}", event);
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!("Override queue closed, dropping {}", event);
                false
            }
        }
    }
}

pub struct EventOverride {
    rx: mpsc::Receiver<DirectionalEvent>,
    step: f32,
}

impl EventOverride {
    pub fn channel(step: f32, queue_size: usize) -> (OverrideSender, EventOverride) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        debug!(
            "Created override queue with capacity {}, step {:.2}",
            queue_size, step
        );
        (OverrideSender { tx }, EventOverride { rx, step })
    }
}

impl Modifier for EventOverride {
    fn update(&mut self, frame: &Frame) -> Frame {
        let Ok(event) = self.rx.try_recv() else {
            return *frame;
        };
        debug!("Applying override event: {}", event);
        let x = frame.axis(Axis::LeftStickX);
        let nudged = match event {
            DirectionalEvent::Left => (x - self.step).max(-1.0),
            DirectionalEvent::Right => (x + self.step).min(1.0),
        };
        frame.with_axis(Axis::LeftStickX, nudged)
    }

    fn name(&self) -> &str {
        "event override"
    }
}

/// Reads one event per line until the source ends. Unknown lines are skipped.
pub async fn feed_lines<R>(reader: R, sender: OverrideSender) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<DirectionalEvent>() {
                    Ok(event) => {
                        if sender.push(event) {
                            accepted += 1;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Override source failed: {}", e);
                break;
            }
        }
    }
    info!("Override source ended after {} events", accepted);
    accepted
}
