//! Capability traits for the two kinds of pipeline stages.

use crate::frame::{Frame, RawSample};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Failed to initialize generator: {0}")]
    InitializationError(String),

    #[error("Failed to read input source: {0}")]
    ReadError(String),
}

/// Produces one raw sample per tick from an input source.
///
/// Implementations are expected to be fail-soft and return the neutral frame
/// when their source misbehaves. The pipeline still treats an `Err` as "no
/// frame this tick" so a misbehaving generator cannot stop the loop.
pub trait Generator: Send + 'static {
    fn generate(&mut self) -> Result<RawSample, GeneratorError>;

    fn name(&self) -> &str {
        "generator"
    }

    fn default_state(&self) -> Frame {
        Frame::neutral()
    }
}

/// Transforms one frame into the next.
///
/// The input is borrowed and never modified; implementations may keep their
/// own state between calls.
pub trait Modifier: Send + 'static {
    fn update(&mut self, frame: &Frame) -> Frame;

    fn name(&self) -> &str {
        "modifier"
    }
}

impl<F> Modifier for F
where
    F: FnMut(&Frame) -> Frame + Send + 'static,
{
    fn update(&mut self, frame: &Frame) -> Frame {
        self(frame)
    }
}
