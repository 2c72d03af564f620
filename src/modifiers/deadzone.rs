//! Stick deadzones and digital ("hair") triggers

use crate::frame::{Axis, Frame};
use crate::pipeline::Modifier;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-axis deadzone on the four stick axes; triggers pass through.
///
/// An axis is zeroed when `|value| < threshold`, a value exactly on the
/// threshold is kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deadzone {
    pub left: f32,
    pub right: f32,
}

impl Default for Deadzone {
    fn default() -> Self {
        Self {
            left: 0.2,
            right: 0.2,
        }
    }
}

impl Deadzone {
    pub fn new(left: f32, right: f32) -> Self {
        debug!("Deadzone modifier: left {:.3}, right {:.3}", left, right);
        Self { left, right }
    }

    fn threshold(&self, axis: Axis) -> f32 {
        match axis {
            Axis::LeftStickX | Axis::LeftStickY => self.left,
            _ => self.right,
        }
    }
}

impl Modifier for Deadzone {
    fn update(&mut self, frame: &Frame) -> Frame {
        Axis::STICKS.iter().fold(*frame, |out, axis| {
            if out.axis(*axis).abs() < self.threshold(*axis) {
                out.with_axis(*axis, 0.0)
            } else {
                out
            }
        })
    }

    fn name(&self) -> &str {
        "deadzone"
    }
}

/// Turns the right trigger into an on/off input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HairTrigger {
    pub threshold: f32,
}

impl Default for HairTrigger {
    fn default() -> Self {
        Self { threshold: 0.1 }
    }
}

impl HairTrigger {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Modifier for HairTrigger {
    fn update(&mut self, frame: &Frame) -> Frame {
        let pulled = frame.axis(Axis::RightTrigger) > self.threshold;
        frame.with_axis(Axis::RightTrigger, if pulled { 1.0 } else { -1.0 })
    }

    fn name(&self) -> &str {
        "hair trigger"
    }
}
