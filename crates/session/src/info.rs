use skillcity_common::{EntityId, InfoRecord};

/// Info/UI collaborator. The session calls it when a click or an approach
/// resolves to an entity, and when the panel should close.
pub trait InfoSink {
    fn show_info(&mut self, id: EntityId, info: &InfoRecord);
    fn hide_info(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoEvent {
    Show(EntityId, InfoRecord),
    Hide,
}

/// Sink that records every call, for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub events: Vec<InfoEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shows(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, InfoEvent::Show(..)))
            .count()
    }

    pub fn hides(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, InfoEvent::Hide)).count()
    }

    pub fn last(&self) -> Option<&InfoEvent> {
        self.events.last()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl InfoSink for RecordingSink {
    fn show_info(&mut self, id: EntityId, info: &InfoRecord) {
        self.events.push(InfoEvent::Show(id, info.clone()));
    }

    fn hide_info(&mut self) {
        self.events.push(InfoEvent::Hide);
    }
}
