use crate::frame::{Axis, Frame};
use crate::pipeline::Modifier;
use serde::{Deserialize, Serialize};

/// Pulls the right stick while the right trigger is held.
///
/// Adds `|strength| * trigger` to right-stick Y once the trigger reaches
/// `threshold`. Right-stick X and every other field are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoilCompensation {
    pub strength: f32,
    pub threshold: f32,
}

impl Default for RecoilCompensation {
    fn default() -> Self {
        Self {
            strength: 0.3,
            threshold: 0.1,
        }
    }
}

impl RecoilCompensation {
    pub fn new(strength: f32, threshold: f32) -> Self {
        Self {
            strength,
            threshold,
        }
    }
}

impl Modifier for RecoilCompensation {
    fn update(&mut self, frame: &Frame) -> Frame {
        let trigger = frame.axis(Axis::RightTrigger);
        if trigger < self.threshold {
            return *frame;
        }
        let compensation = self.strength.abs() * trigger;
        frame.with_axis(
            Axis::RightStickY,
            frame.axis(Axis::RightStickY) + compensation,
        )
    }

    fn name(&self) -> &str {
        "recoil compensation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Dpad;

    fn aim(rx: f32, ry: f32, trigger: f32) -> Frame {
        Frame::new([false; 10], [0.0, 0.0, rx, ry, 0.0, trigger], Dpad::CENTER)
    }

    #[test]
    fn below_threshold_is_passthrough() {
        let mut recoil = RecoilCompensation::default();
        let frame = aim(0.2, -0.4, 0.099);
        assert_eq!(recoil.update(&frame), frame);
        let rest = aim(0.0, 0.0, 0.0);
        assert_eq!(recoil.update(&rest), rest);
    }

    #[test]
    fn threshold_itself_applies() {
        let mut recoil = RecoilCompensation::default();
        let out = recoil.update(&aim(0.0, 0.0, 0.1));
        assert!(out.axis(Axis::RightStickY) > 0.0);
    }

    #[test]
    fn full_pull_adds_strength_exactly() {
        let mut recoil = RecoilCompensation::default();
        let out = recoil.update(&aim(0.0, 0.0, 1.0));
        assert_eq!(out.axis(Axis::RightStickY), recoil.strength);
    }

    #[test]
    fn scales_with_trigger() {
        let mut recoil = RecoilCompensation::new(0.3, 0.1);
        for trigger in [0.25f32, 0.5, 0.75, 1.0] {
            let out = recoil.update(&aim(0.0, 0.0, trigger));
            assert_eq!(out.axis(Axis::RightStickY), 0.0 + 0.3 * trigger);
        }
    }

    #[test]
    fn aim_direction_preserved() {
        let mut recoil = RecoilCompensation::default();
        for (rx, ry) in [(0.5, 0.0), (-0.5, 0.0), (0.0, 0.5), (0.0, -0.5), (0.5, 0.5)] {
            let out = recoil.update(&aim(rx, ry, 1.0));
            assert_eq!(out.axis(Axis::RightStickX), rx);
            assert_eq!(out.axis(Axis::RightStickY), ry + 0.3 * 1.0);
        }
    }

    #[test]
    fn negative_strength_still_pulls_up() {
        let mut recoil = RecoilCompensation::new(-0.3, 0.1);
        let out = recoil.update(&aim(0.0, 0.0, 1.0));
        assert_eq!(out.axis(Axis::RightStickY), 0.3);
    }

    #[test]
    fn result_stays_in_range() {
        let mut recoil = RecoilCompensation::new(0.8, 0.1);
        let out = recoil.update(&aim(0.0, 0.9, 1.0));
        assert_eq!(out.axis(Axis::RightStickY), 1.0);
    }
}
