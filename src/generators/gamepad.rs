use crate::frame::{Axis as FrameAxis, Frame, RawSample, AXIS_COUNT, BUTTON_COUNT};
use crate::pipeline::{Generator, GeneratorError};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

/// Physical buttons in frame order: A, B, X, Y, LB, RB, BACK, START, LS, RS
const BUTTON_ORDER: [Button; BUTTON_COUNT] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
];

/// Reads the active gamepad through gilrs.
///
/// Never fails once created: without a connected pad every tick yields the
/// neutral frame, and a pad plugged in later is picked up automatically.
pub struct GamepadGenerator {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
    preferred_index: Option<usize>,
}

impl GamepadGenerator {
    pub fn create(preferred_index: Option<usize>) -> Result<Self, GeneratorError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(GeneratorError::InitializationError(e.to_string()));
            }
        };

        let mut generator = Self {
            gilrs,
            active_gamepad: None,
            preferred_index,
        };
        generator.select_gamepad();
        Ok(generator)
    }

    pub fn active_gamepad(&self) -> Option<GamepadId> {
        self.active_gamepad
    }

    fn select_gamepad(&mut self) {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();
        if gamepads.is_empty() {
            warn!("No gamepad connected, sending neutral frames until one appears");
            self.active_gamepad = None;
            return;
        }

        info!("Found {} gamepads:", gamepads.len());
        for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
            info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
        }

        let index = match self.preferred_index {
            Some(i) if i < gamepads.len() => i,
            Some(i) => {
                warn!("Gamepad index {} not available, using first gamepad", i);
                0
            }
            None => 0,
        };
        let (id, gamepad) = &gamepads[index];
        info!("Selected gamepad: {} ({})", gamepad.name(), id);
        self.active_gamepad = Some(*id);
    }

    // Drains pending gilrs events so cached state is current
    fn pump_events(&mut self) {
        let mut reselect = false;
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    info!("Gamepad {} connected", id);
                    if self.active_gamepad.is_none() {
                        reselect = true;
                    }
                }
                EventType::Disconnected => {
                    if self.active_gamepad == Some(id) {
                        warn!("Active gamepad {} disconnected", id);
                        reselect = true;
                    } else {
                        debug!("Inactive gamepad {} disconnected", id);
                    }
                }
                _ => {}
            }
        }
        if reselect {
            self.select_gamepad();
        }
    }

    fn read_frame(&self, id: GamepadId) -> Frame {
        let Some(gamepad) = self.gilrs.connected_gamepad(id) else {
            return Frame::neutral();
        };

        let buttons = BUTTON_ORDER.map(|button| gamepad.is_pressed(button));

        let trigger = |button: Button| {
            gamepad
                .button_data(button)
                .map(|data| data.value() * 2.0 - 1.0)
                .unwrap_or(-1.0)
        };

        let mut axes = [0.0f32; AXIS_COUNT];
        axes[FrameAxis::LeftStickX.index()] = gamepad.value(Axis::LeftStickX);
        axes[FrameAxis::LeftStickY.index()] = -gamepad.value(Axis::LeftStickY);
        axes[FrameAxis::RightStickX.index()] = gamepad.value(Axis::RightStickX);
        axes[FrameAxis::RightStickY.index()] = -gamepad.value(Axis::RightStickY);
        axes[FrameAxis::LeftTrigger.index()] = trigger(Button::LeftTrigger2);
        axes[FrameAxis::RightTrigger.index()] = trigger(Button::RightTrigger2);

        let mut hx = 0;
        let mut hy = 0;
        if gamepad.is_pressed(Button::DPadUp) {
            hy = 1;
        }
        if gamepad.is_pressed(Button::DPadDown) {
            hy = -1;
        }
        if gamepad.is_pressed(Button::DPadLeft) {
            hx = -1;
        }
        if gamepad.is_pressed(Button::DPadRight) {
            hx = 1;
        }

        Frame::new(buttons, axes, (hx, hy))
    }
}

impl Generator for GamepadGenerator {
    fn generate(&mut self) -> Result<RawSample, GeneratorError> {
        self.pump_events();
        let frame = match self.active_gamepad {
            Some(id) => self.read_frame(id),
            None => self.default_state(),
        };
        Ok(frame.into())
    }

    fn name(&self) -> &str {
        "gilrs gamepad"
    }
}
