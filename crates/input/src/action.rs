use serde::{Deserialize, Serialize};

/// Held controls that map onto [`crate::InputState`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Forward,
    Backward,
    Left,
    Right,
    Run,
}

/// A high-level action produced by whatever device the host listens to.
///
/// The session consumes actions and polled state, never raw window events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Press(Control),
    Release(Control),
    /// One-shot "interact" pulse.
    Interact,
    /// Pointer click in window pixels, origin at the top-left.
    Click { x: f32, y: f32 },
    ToggleCameraMode,
    ToggleInspector,
    /// Input that is not bound to anything.
    Noop,
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::Noop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_use_snake_case_names() {
        let c: Control = serde_yaml::from_str("backward").unwrap();
        assert_eq!(c, Control::Backward);
    }

    #[test]
    fn noop_detection() {
        assert!(Action::Noop.is_noop());
        assert!(!Action::Interact.is_noop());
        assert!(!Action::Click { x: 1.0, y: 2.0 }.is_noop());
    }
}
