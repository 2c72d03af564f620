//! Controller input bridge for the XSerialOne adapter
//!
//! Input generators produce raw samples, the pipeline normalizes them into
//! [`frame::Frame`]s, runs them through the configured modifiers and writes
//! the encoded 29-byte packet to a serial transport.

pub mod config;
pub mod frame;
pub mod generators;
pub mod modifiers;
pub mod observer;
pub mod pipeline;
pub mod transport;
pub mod wire;
