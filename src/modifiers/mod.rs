//! Built-in frame modifiers
//!
//! Each modifier is a [`Modifier`](crate::pipeline::Modifier) and returns a
//! new frame. Registration order is application order.

pub mod deadzone;
pub mod event_override;
pub mod recoil;

pub use deadzone::{Deadzone, HairTrigger};
pub use event_override::{feed_lines, DirectionalEvent, EventOverride, OverrideSender};
pub use recoil::RecoilCompensation;
