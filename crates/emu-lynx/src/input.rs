//! Input handling.
//!
//! Two layers, as elsewhere in the workspace:
//! 1. [`Joypad`] — logical buttons mapped to the active-low `JOYSTICK` and
//!    `SWITCHES` register encodings, with the d-pad rotated to match the
//!    screen orientation vertical games expect.
//! 2. [`InputQueue`] — timed button events for scripted sequences.

use emu_core::{Rotation, Serializer};

/// A button on the Lynx's built-in pad.
///
/// `Option1`/`Option2` are the two small buttons beside the d-pad; `Pause`
/// lives on the `SWITCHES` register rather than `JOYSTICK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LynxButton {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Option1,
    Option2,
    Pause,
}

impl LynxButton {
    /// Bit position inside the joypad state mask (not the register).
    const fn bit(self) -> u16 {
        match self {
            Self::Up => 1 << 0,
            Self::Down => 1 << 1,
            Self::Left => 1 << 2,
            Self::Right => 1 << 3,
            Self::A => 1 << 4,
            Self::B => 1 << 5,
            Self::Option1 => 1 << 6,
            Self::Option2 => 1 << 7,
            Self::Pause => 1 << 8,
        }
    }

    /// Where this direction points after the player physically rotates the
    /// console the way the running title asks. Vertical games read the
    /// hardware bits knowing the pad is turned with the case, so the
    /// player-space direction maps to a different hardware direction.
    const fn rotated(self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::None => self,
            // Console turned 90° counter-clockwise.
            Rotation::Left => match self {
                Self::Up => Self::Right,
                Self::Right => Self::Down,
                Self::Down => Self::Left,
                Self::Left => Self::Up,
                other => other,
            },
            // Console turned 90° clockwise.
            Rotation::Right => match self {
                Self::Up => Self::Left,
                Self::Left => Self::Down,
                Self::Down => Self::Right,
                Self::Right => Self::Up,
                other => other,
            },
        }
    }
}

/// Current button state, latched into Suzy once per frame.
#[derive(Default)]
pub struct Joypad {
    /// One bit per [`LynxButton`], 1 = held.
    buttons: u16,
}

impl Joypad {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: LynxButton, pressed: bool) {
        if pressed {
            self.buttons |= button.bit();
        } else {
            self.buttons &= !button.bit();
        }
    }

    #[must_use]
    pub fn is_pressed(&self, button: LynxButton) -> bool {
        self.buttons & button.bit() != 0
    }

    pub fn release_all(&mut self) {
        self.buttons = 0;
    }

    /// The `JOYSTICK` register value: active low, bit 0 Right through
    /// bit 7 A. The d-pad is remapped for rotated titles.
    #[must_use]
    pub fn joystick_value(&self, rotation: Rotation) -> u8 {
        let mut value = 0xFF;
        let mut press = |button: LynxButton, bit: u8| {
            if self.is_pressed(button) {
                value &= !bit;
            }
        };
        press(LynxButton::Right.rotated(rotation), 0x01);
        press(LynxButton::Left.rotated(rotation), 0x02);
        press(LynxButton::Down.rotated(rotation), 0x04);
        press(LynxButton::Up.rotated(rotation), 0x08);
        press(LynxButton::Option1, 0x10);
        press(LynxButton::Option2, 0x20);
        press(LynxButton::B, 0x40);
        press(LynxButton::A, 0x80);
        value
    }

    /// The `SWITCHES` register value: active low, Pause on bit 0.
    #[must_use]
    pub fn switches_value(&self) -> u8 {
        let mut value = 0xFF;
        if self.is_pressed(LynxButton::Pause) {
            value &= !0x01;
        }
        value
    }

    pub(crate) fn serialize(&mut self, s: &mut Serializer) {
        s.u16(&mut self.buttons);
    }
}

/// A timed button event.
#[derive(Debug, Clone)]
pub struct InputEvent {
    /// Frame the event fires on.
    pub frame: u64,
    pub button: LynxButton,
    /// True = press, false = release.
    pub pressed: bool,
}

/// Scripted button timeline.
///
/// Hosts queue presses ahead of time; the console drains everything due
/// for the current frame before the frame's first instruction runs, so a
/// given script lands on the same machine state in every run.
#[derive(Default)]
pub struct InputQueue {
    /// Sorted by firing frame, latest first, so due events pop off the
    /// end. Events on the same frame keep their insertion order.
    events: Vec<InputEvent>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a single event.
    pub fn push(&mut self, event: InputEvent) {
        let at = self.events.partition_point(|e| e.frame > event.frame);
        self.events.insert(at, event);
    }

    /// Queue a press at `at_frame` and its release `hold_frames` later.
    pub fn enqueue_button(&mut self, button: LynxButton, at_frame: u64, hold_frames: u64) {
        self.push(InputEvent {
            frame: at_frame,
            button,
            pressed: true,
        });
        self.push(InputEvent {
            frame: at_frame + hold_frames,
            button,
            pressed: false,
        });
    }

    /// Drain every event due at `frame` into the pad.
    pub fn process(&mut self, frame: u64, pad: &mut Joypad) {
        while let Some(event) = self.events.last() {
            if event.frame > frame {
                return;
            }
            pad.set_button(event.button, event.pressed);
            self.events.pop();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
