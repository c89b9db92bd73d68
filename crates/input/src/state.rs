use glam::Vec2;

use crate::action::{Action, Control};

/// Current movement flags plus the pending interact pulse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub run: bool,
    interact: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, control: Control, pressed: bool) {
        match control {
            Control::Forward => self.forward = pressed,
            Control::Backward => self.backward = pressed,
            Control::Left => self.left = pressed,
            Control::Right => self.right = pressed,
            Control::Run => self.run = pressed,
        }
    }

    pub fn with(mut self, control: Control) -> Self {
        self.set(control, true);
        self
    }

    /// Fold an action into the state. Returns `false` for actions that are
    /// not state changes (clicks, mode toggles), which the caller handles.
    pub fn apply(&mut self, action: &Action) -> bool {
        match *action {
            Action::Press(control) => self.set(control, true),
            Action::Release(control) => self.set(control, false),
            Action::Interact => self.interact = true,
            Action::Noop => {}
            Action::Click { .. } | Action::ToggleCameraMode | Action::ToggleInspector => return false,
        }
        true
    }

    pub fn interact_pending(&self) -> bool {
        self.interact
    }

    /// Consume the interact pulse; it fires once per press.
    pub fn take_interact(&mut self) -> bool {
        std::mem::take(&mut self.interact)
    }

    /// Raw movement intent: `x` is right minus left, `y` is forward minus
    /// backward. Opposite keys cancel out.
    pub fn movement(&self) -> Vec2 {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;
        Vec2::new(axis(self.right, self.left), axis(self.forward, self.backward))
    }

    pub fn is_moving(&self) -> bool {
        self.movement() != Vec2::ZERO
    }

    /// Release every held control, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut state = InputState::new();
        assert!(state.apply(&Action::Press(Control::Forward)));
        assert!(state.forward);
        assert!(state.apply(&Action::Release(Control::Forward)));
        assert!(!state.forward);
    }

    #[test]
    fn interact_is_a_pulse() {
        let mut state = InputState::new();
        state.apply(&Action::Interact);
        assert!(state.interact_pending());
        assert!(state.take_interact());
        assert!(!state.take_interact());
    }

    #[test]
    fn opposite_keys_cancel() {
        let state = InputState::new().with(Control::Forward).with(Control::Backward);
        assert_eq!(state.movement(), Vec2::ZERO);
        assert!(!state.is_moving());

        let diagonal = InputState::new().with(Control::Forward).with(Control::Left);
        assert_eq!(diagonal.movement(), Vec2::new(-1.0, 1.0));
    }

    #[test]
    fn clicks_are_left_to_the_caller() {
        let mut state = InputState::new();
        assert!(!state.apply(&Action::Click { x: 0.0, y: 0.0 }));
        assert!(!state.apply(&Action::ToggleCameraMode));
        assert_eq!(state, InputState::new());
    }
}
