//! Joypad model.
//!
//! Input is latched once per tick: the previous state takes the current
//! one and the current state takes the new buttons. Edge queries compare
//! the two.

use std::fmt;
use std::ops::BitOr;

use cartridge_types::{Button, InputQuery};
use serde::{Deserialize, Serialize};

/// A set of pressed buttons, using the bit values of GBDK's `J_*` masks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buttons(pub u8);

impl Buttons {
    pub const NONE: Buttons = Buttons(0);

    pub fn contains(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    pub fn with(self, button: Button) -> Self {
        Self(self.0 | button.mask())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<Button> for Buttons {
    fn from(button: Button) -> Self {
        Self(button.mask())
    }
}

impl BitOr for Buttons {
    type Output = Buttons;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Button> for Buttons {
    type Output = Buttons;

    fn bitor(self, rhs: Button) -> Self {
        self.with(rhs)
    }
}

impl fmt::Display for Buttons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = Button::ALL
            .iter()
            .filter(|b| self.contains(**b))
            .map(|b| format!("{b:?}"))
            .collect();
        if names.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// Current and previous latched joypad state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub current: Buttons,
    pub previous: Buttons,
}

impl InputState {
    pub fn latch(&mut self, buttons: Buttons) {
        self.previous = self.current;
        self.current = buttons;
    }

    pub fn held(&self, button: Button) -> bool {
        self.current.contains(button)
    }

    pub fn pressed(&self, button: Button) -> bool {
        self.current.contains(button) && !self.previous.contains(button)
    }

    pub fn released(&self, button: Button) -> bool {
        !self.current.contains(button) && self.previous.contains(button)
    }

    pub fn query(&self, query: InputQuery, button: Button) -> bool {
        match query {
            InputQuery::Held => self.held(button),
            InputQuery::Pressed => self.pressed(button),
            InputQuery::Released => self.released(button),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_edges() {
        let mut input = InputState::default();
        input.latch(Button::A.into());
        assert!(input.pressed(Button::A));
        assert!(input.held(Button::A));
        input.latch(Button::A.into());
        assert!(!input.pressed(Button::A));
        assert!(input.held(Button::A));
        input.latch(Buttons::NONE);
        assert!(input.released(Button::A));
        assert!(!input.held(Button::A));
    }

    #[test]
    fn masks_match_gbdk() {
        let b = Buttons::from(Button::Start) | Button::A;
        assert_eq!(b.0, 0x90);
        assert_eq!(b.to_string(), "A+Start");
        assert_eq!(Buttons::NONE.to_string(), "-");
    }
}
