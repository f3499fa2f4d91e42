//! Debug display mode selected with the number keys.

use serde::{Deserialize, Serialize};

/// What the composite pass shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Shaded fluid over the environment.
    #[default]
    Composite,
    /// Raw particle depth from channel `w`.
    Depth,
    /// Smoothed thickness from channel `x`. The packed layout keeps depth
    /// unsmoothed in `w`, so this is the only smoothed quantity to show.
    SmoothDepth,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [DisplayMode::Composite, DisplayMode::Depth, DisplayMode::SmoothDepth];

    /// Mode with the given ordinal, if there is one.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// Value pushed to the composite program's `debug_display_mode`.
    pub fn ordinal(self) -> i32 {
        match self {
            DisplayMode::Composite => 0,
            DisplayMode::Depth => 1,
            DisplayMode::SmoothDepth => 2,
        }
    }
}

/// Owns the current [`DisplayMode`]. Persists for the lifetime of the frame
/// context; there is no terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplayModeController {
    mode: DisplayMode,
}

impl DisplayModeController {
    pub fn new(initial: DisplayMode) -> Self {
        Self { mode: initial }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Handles a number key press. Digits without a matching mode are
    /// ignored and the current mode is kept.
    ///
    /// Returns the new mode when it changed.
    pub fn handle_digit(&mut self, digit: u8) -> Option<DisplayMode> {
        let Some(mode) = DisplayMode::from_ordinal(digit) else {
            log::debug!("Ignoring display mode input {digit}, keeping {:?}", self.mode);
            return None;
        };
        if mode == self.mode {
            return None;
        }
        log::info!("Set display mode: {:?}", mode);
        self.mode = mode;
        Some(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_select_by_ordinal() {
        let mut controller = DisplayModeController::default();
        assert_eq!(controller.mode(), DisplayMode::Composite);

        assert_eq!(controller.handle_digit(1), Some(DisplayMode::Depth));
        assert_eq!(controller.handle_digit(2), Some(DisplayMode::SmoothDepth));
        assert_eq!(controller.handle_digit(0), Some(DisplayMode::Composite));
        assert_eq!(controller.mode(), DisplayMode::Composite);
    }

    #[test]
    fn test_out_of_range_digits_are_ignored() {
        let mut controller = DisplayModeController::new(DisplayMode::Depth);
        for digit in 3..=9 {
            assert_eq!(controller.handle_digit(digit), None);
            assert_eq!(controller.mode(), DisplayMode::Depth);
        }
    }

    #[test]
    fn test_repeated_digit_is_not_a_transition() {
        let mut controller = DisplayModeController::default();
        assert_eq!(controller.handle_digit(0), None);
        assert_eq!(controller.mode(), DisplayMode::Composite);
    }

    #[test]
    fn test_ordinals_round_trip() {
        for mode in DisplayMode::ALL {
            assert_eq!(DisplayMode::from_ordinal(mode.ordinal() as u8), Some(mode));
        }
    }
}
