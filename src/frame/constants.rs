//! Index table shared by the frame model, the modifiers and the wire encoder.
//!
//! The numeric values are part of the wire format: button `i` is bit `i` of
//! the packet mask and axis `i` is the `i`-th float of the axes block.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub const BUTTON_COUNT: usize = 10;
pub const AXIS_COUNT: usize = 6;

// Axis positions inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Axis {
    LeftStickX = 0,
    LeftStickY = 1,
    RightStickX = 2,
    RightStickY = 3,
    LeftTrigger = 4,
    RightTrigger = 5,
}

impl Axis {
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::LeftStickX,
        Axis::LeftStickY,
        Axis::RightStickX,
        Axis::RightStickY,
        Axis::LeftTrigger,
        Axis::RightTrigger,
    ];

    /// The four stick axes, left stick first
    pub const STICKS: [Axis; 4] = [
        Axis::LeftStickX,
        Axis::LeftStickY,
        Axis::RightStickX,
        Axis::RightStickY,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

// Button positions inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Button {
    A = 0,
    B = 1,
    X = 2,
    Y = 3,
    LeftBumper = 4,
    RightBumper = 5,
    Back = 6,
    Start = 7,
    LeftStick = 8,
    RightStick = 9,
}

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::LeftBumper,
        Button::RightBumper,
        Button::Back,
        Button::Start,
        Button::LeftStick,
        Button::RightStick,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit of this button inside the packet mask
    pub const fn mask(self) -> u16 {
        1 << (self as u16)
    }
}

impl Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::LeftBumper => "LB",
            Button::RightBumper => "RB",
            Button::Back => "BACK",
            Button::Start => "START",
            Button::LeftStick => "LS",
            Button::RightStick => "RS",
        };
        write!(f, "{}", name)
    }
}

/// Named dpad positions as `(hx, hy)`, up is positive `hy`
pub struct Dpad;

impl Dpad {
    pub const CENTER: (i8, i8) = (0, 0);
    pub const UP: (i8, i8) = (0, 1);
    pub const DOWN: (i8, i8) = (0, -1);
    pub const LEFT: (i8, i8) = (-1, 0);
    pub const RIGHT: (i8, i8) = (1, 0);
    pub const UP_LEFT: (i8, i8) = (-1, 1);
    pub const UP_RIGHT: (i8, i8) = (1, 1);
    pub const DOWN_LEFT: (i8, i8) = (-1, -1);
    pub const DOWN_RIGHT: (i8, i8) = (1, -1);

    pub const ALL: [(i8, i8); 9] = [
        Dpad::DOWN_LEFT,
        Dpad::DOWN,
        Dpad::DOWN_RIGHT,
        Dpad::LEFT,
        Dpad::CENTER,
        Dpad::RIGHT,
        Dpad::UP_LEFT,
        Dpad::UP,
        Dpad::UP_RIGHT,
    ];
}
