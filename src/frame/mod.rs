//! Canonical controller frame
//!
//! A [`Frame`] is one immutable snapshot of controller input: ten buttons, six
//! axes and a two-axis dpad. Every frame that exists satisfies the layout
//! invariants (axes in [-1, 1], dpad components in {-1, 0, 1}); the only ways
//! to build one are the validated factories below.
//!
//! ```text
//! Generator ──► RawSample ──► Frame::normalize ──► Frame ──► Modifiers ──► Packet
//! ```

pub mod constants;
mod normalize;

pub use constants::{Axis, Button, Dpad, AXIS_COUNT, BUTTON_COUNT};

use serde_json::{json, Value};
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    buttons: [bool; BUTTON_COUNT],
    axes: [f32; AXIS_COUNT],
    dpad: (i8, i8),
}

impl Default for Frame {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Frame {
    /// All buttons released, all axes at rest, dpad centered
    pub const fn neutral() -> Self {
        Self {
            buttons: [false; BUTTON_COUNT],
            axes: [0.0; AXIS_COUNT],
            dpad: Dpad::CENTER,
        }
    }

    /// Builds a frame from typed fields, clamping anything out of range
    pub fn new(buttons: [bool; BUTTON_COUNT], axes: [f32; AXIS_COUNT], dpad: (i8, i8)) -> Self {
        let axes = axes.map(|value| normalize::clamp_axis(f64::from(value)));
        Self {
            buttons,
            axes,
            dpad: (
                normalize::clamp_hat(i64::from(dpad.0)),
                normalize::clamp_hat(i64::from(dpad.1)),
            ),
        }
    }

    /// Builds a frame from arbitrary external data.
    ///
    /// Never fails. Expects an object shaped like
    /// `{"buttons": [...], "axes": [...], "dpad": [hx, hy]}`; missing keys,
    /// wrong types and wrong lengths fall back to neutral values, short
    /// sequences are padded and long ones truncated.
    pub fn normalize(raw: &Value) -> Self {
        let Some(object) = raw.as_object() else {
            return Self::neutral();
        };
        Self {
            buttons: normalize::buttons(object.get("buttons")),
            axes: normalize::axes(object.get("axes")),
            dpad: normalize::dpad(object.get("dpad")),
        }
    }

    /// Independent plain copy of this frame for external consumers
    pub fn to_plain_form(&self) -> Value {
        json!({
            "buttons": self.buttons.to_vec(),
            "axes": self.axes.to_vec(),
            "dpad": [self.dpad.0, self.dpad.1],
        })
    }

    pub fn buttons(&self) -> &[bool; BUTTON_COUNT] {
        &self.buttons
    }

    pub fn axes(&self) -> &[f32; AXIS_COUNT] {
        &self.axes
    }

    pub fn dpad(&self) -> (i8, i8) {
        self.dpad
    }

    pub fn button(&self, button: Button) -> bool {
        self.buttons[button.index()]
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        self.axes[axis.index()]
    }

    pub fn with_button(self, button: Button, pressed: bool) -> Self {
        let mut buttons = self.buttons;
        buttons[button.index()] = pressed;
        Self { buttons, ..self }
    }

    /// Copy with one axis replaced, clamped into [-1, 1]
    pub fn with_axis(self, axis: Axis, value: f32) -> Self {
        let mut axes = self.axes;
        axes[axis.index()] = normalize::clamp_axis(f64::from(value));
        Self { axes, ..self }
    }

    pub fn with_dpad(self, hx: i8, hy: i8) -> Self {
        Self {
            dpad: (
                normalize::clamp_hat(i64::from(hx)),
                normalize::clamp_hat(i64::from(hy)),
            ),
            ..self
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::neutral()
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pressed: Vec<String> = Button::ALL
            .iter()
            .filter(|b| self.button(**b))
            .map(|b| b.to_string())
            .collect();
        write!(
            f,
            "L:({:.2},{:.2}) R:({:.2},{:.2}) LT:{:.2} RT:{:.2} D:({},{}) Buttons:[{}]",
            self.axis(Axis::LeftStickX),
            self.axis(Axis::LeftStickY),
            self.axis(Axis::RightStickX),
            self.axis(Axis::RightStickY),
            self.axis(Axis::LeftTrigger),
            self.axis(Axis::RightTrigger),
            self.dpad.0,
            self.dpad.1,
            pressed.join(",")
        )
    }
}

/// Output of a generator before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawSample {
    /// Already canonical, produced by a typed backend
    Frame(Frame),
    /// Loosely typed data, e.g. decoded from an external message
    Plain(Value),
}

impl RawSample {
    pub fn normalize(&self) -> Frame {
        match self {
            RawSample::Frame(frame) => *frame,
            RawSample::Plain(value) => Frame::normalize(value),
        }
    }
}

impl From<Frame> for RawSample {
    fn from(frame: Frame) -> Self {
        RawSample::Frame(frame)
    }
}

impl From<Value> for RawSample {
    fn from(value: Value) -> Self {
        RawSample::Plain(value)
    }
}
