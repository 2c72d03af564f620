//! Input sources feeding the pipeline

pub mod gamepad;

pub use gamepad::GamepadGenerator;
