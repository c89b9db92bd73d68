use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::action::{Action, Control};

/// Key-name to action mapping. Key names follow the physical key codes the
/// desktop host reports (`KeyW`, `ArrowUp`, `ShiftLeft`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bindings {
    pub controls: BTreeMap<String, Control>,
    pub interact: Vec<String>,
    pub toggle_camera: Vec<String>,
    pub toggle_inspector: Vec<String>,
}

impl Default for Bindings {
    fn default() -> Self {
        let controls = [
            ("KeyW", Control::Forward),
            ("ArrowUp", Control::Forward),
            ("KeyS", Control::Backward),
            ("ArrowDown", Control::Backward),
            ("KeyA", Control::Left),
            ("ArrowLeft", Control::Left),
            ("KeyD", Control::Right),
            ("ArrowRight", Control::Right),
            ("ShiftLeft", Control::Run),
            ("ShiftRight", Control::Run),
        ]
        .into_iter()
        .map(|(k, c)| (k.to_string(), c))
        .collect();
        Self {
            controls,
            interact: vec!["KeyE".into(), "Enter".into()],
            toggle_camera: vec!["KeyC".into()],
            toggle_inspector: vec!["F1".into()],
        }
    }
}

impl Bindings {
    /// Translate a key transition. One-shot actions fire on press only.
    pub fn action_for(&self, key: &str, pressed: bool) -> Action {
        if let Some(&control) = self.controls.get(key) {
            return if pressed {
                Action::Press(control)
            } else {
                Action::Release(control)
            };
        }
        if !pressed {
            return Action::Noop;
        }
        let matches = |keys: &[String]| keys.iter().any(|k| k == key);
        if matches(&self.interact) {
            Action::Interact
        } else if matches(&self.toggle_camera) {
            Action::ToggleCameraMode
        } else if matches(&self.toggle_inspector) {
            Action::ToggleInspector
        } else {
            tracing::trace!(key, "unbound key");
            Action::Noop
        }
    }
}

/// Anything that can be polled for actions once per frame.
pub trait InputSource {
    fn poll(&mut self) -> Vec<Action>;
}

/// Replays a fixed script: each entry is emitted on its frame index.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: VecDeque<(u64, Action)>,
    frame: u64,
}

impl ScriptedInput {
    pub fn new(script: impl IntoIterator<Item = (u64, Action)>) -> Self {
        let mut script: Vec<_> = script.into_iter().collect();
        script.sort_by_key(|(frame, _)| *frame);
        Self {
            script: script.into(),
            frame: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.script.is_empty()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        while self.script.front().is_some_and(|(frame, _)| *frame <= self.frame) {
            if let Some((_, action)) = self.script.pop_front() {
                out.push(action);
            }
        }
        self.frame += 1;
        out
    }
}
