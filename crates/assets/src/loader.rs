use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};

/// Identifies one outstanding load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    Texture { path: String },
    Model { path: String },
}

impl LoadRequest {
    pub fn path(&self) -> &str {
        match self {
            Self::Texture { path } | Self::Model { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureAsset {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationClip {
    pub name: String,
    pub channels: usize,
}

/// An articulated model: its node hierarchy names and animation clips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAsset {
    pub path: String,
    pub root_node: String,
    pub nodes: Vec<String>,
    pub animation_clips: Vec<AnimationClip>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedAsset {
    Texture(TextureAsset),
    Model(ModelAsset),
}

/// Errors raised at the loader boundary. They never escape the frame loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetLoadError {
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("unsupported asset format: {0}")]
    Unsupported(String),
}

/// Completion message for one request.
#[derive(Debug, Clone)]
pub struct LoadEvent {
    pub ticket: LoadTicket,
    pub request: LoadRequest,
    pub outcome: Result<LoadedAsset, AssetLoadError>,
}

/// Reply channel handed to a loader for a single request.
#[derive(Debug, Clone)]
pub struct LoadReply {
    ticket: LoadTicket,
    request: LoadRequest,
    sender: Sender<LoadEvent>,
}

impl LoadReply {
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    pub fn request(&self) -> &LoadRequest {
        &self.request
    }

    /// Deliver the result. If the queue is gone the result is dropped.
    pub fn complete(self, outcome: Result<LoadedAsset, AssetLoadError>) {
        let event = LoadEvent {
            ticket: self.ticket,
            request: self.request,
            outcome,
        };
        if self.sender.send(event).is_err() {
            tracing::debug!(ticket = self.ticket.0, "load finished after queue was dropped");
        }
    }
}

/// Asset loading collaborator. Implementations may finish on any later frame
/// (or on another thread); results only ever arrive through the reply.
pub trait AssetLoader {
    fn start(&self, reply: LoadReply);
}

/// Single-consumer queue of load completions, drained once per frame.
///
/// Cancelled tickets (and everything outstanding once the queue is closed) are
/// silently discarded when they complete, so a late callback can never touch
/// state that has been torn down.
#[derive(Debug)]
pub struct LoadQueue {
    sender: Sender<LoadEvent>,
    receiver: Receiver<LoadEvent>,
    next_ticket: u64,
    outstanding: HashSet<LoadTicket>,
    closed: bool,
}

impl Default for LoadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            next_ticket: 1,
            outstanding: HashSet::new(),
            closed: false,
        }
    }

    /// Issue a request through `loader`. After `close` no request is started
    /// and `None` is returned.
    pub fn request(&mut self, loader: &dyn AssetLoader, request: LoadRequest) -> Option<LoadTicket> {
        if self.closed {
            tracing::debug!(path = request.path(), "load requested after close, ignoring");
            return None;
        }
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        self.outstanding.insert(ticket);
        tracing::debug!(ticket = ticket.0, path = request.path(), "load requested");
        loader.start(LoadReply {
            ticket,
            request,
            sender: self.sender.clone(),
        });
        Some(ticket)
    }

    pub fn cancel(&mut self, ticket: LoadTicket) -> bool {
        self.outstanding.remove(&ticket)
    }

    /// Cancel everything outstanding and refuse new requests.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!(outstanding = self.outstanding.len(), "load queue closed");
        }
        self.closed = true;
        self.outstanding.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_outstanding(&self, ticket: LoadTicket) -> bool {
        self.outstanding.contains(&ticket)
    }

    /// Take every completion that arrived since the last drain, skipping
    /// cancelled tickets.
    pub fn drain(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            if self.outstanding.remove(&event.ticket) {
                events.push(event);
            } else {
                tracing::debug!(ticket = event.ticket.0, "discarding cancelled load");
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Completes immediately with a fixed-size texture.
    struct InstantLoader;

    impl AssetLoader for InstantLoader {
        fn start(&self, reply: LoadReply) {
            let path = reply.request().path().to_string();
            reply.complete(Ok(LoadedAsset::Texture(TextureAsset {
                path,
                width: 4,
                height: 4,
            })));
        }
    }

    /// Holds replies until the test decides to complete them.
    #[derive(Default)]
    struct DeferredLoader {
        pending: RefCell<Vec<LoadReply>>,
    }

    impl AssetLoader for DeferredLoader {
        fn start(&self, reply: LoadReply) {
            self.pending.borrow_mut().push(reply);
        }
    }

    fn texture(path: &str) -> LoadRequest {
        LoadRequest::Texture { path: path.into() }
    }

    #[test]
    fn instant_load_is_drained_once() {
        let mut queue = LoadQueue::new();
        let ticket = queue.request(&InstantLoader, texture("logo.png")).unwrap();
        assert!(queue.is_outstanding(ticket));

        let events = queue.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ticket, ticket);
        assert!(queue.drain().is_empty());
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn cancelled_load_is_discarded() {
        let loader = DeferredLoader::default();
        let mut queue = LoadQueue::new();
        let ticket = queue.request(&loader, texture("a.png")).unwrap();
        assert!(queue.cancel(ticket));

        for reply in loader.pending.borrow_mut().drain(..) {
            reply.complete(Err(AssetLoadError::Unsupported("a.png".into())));
        }
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn close_discards_late_completions_and_refuses_requests() {
        let loader = DeferredLoader::default();
        let mut queue = LoadQueue::new();
        queue.request(&loader, texture("a.png")).unwrap();
        queue.request(&loader, LoadRequest::Model { path: "hero.gltf".into() }).unwrap();
        queue.close();

        for reply in loader.pending.borrow_mut().drain(..) {
            let path = reply.request().path().to_string();
            reply.complete(Ok(LoadedAsset::Texture(TextureAsset {
                path,
                width: 1,
                height: 1,
            })));
        }
        assert!(queue.drain().is_empty());
        assert!(queue.request(&InstantLoader, texture("b.png")).is_none());
    }

    #[test]
    fn completion_after_queue_dropped_does_not_panic() {
        let loader = DeferredLoader::default();
        {
            let mut queue = LoadQueue::new();
            queue.request(&loader, texture("a.png")).unwrap();
        }
        for reply in loader.pending.borrow_mut().drain(..) {
            reply.complete(Err(AssetLoadError::Unsupported("a.png".into())));
        }
    }

    #[test]
    fn tickets_are_unique() {
        let mut queue = LoadQueue::new();
        let a = queue.request(&InstantLoader, texture("a.png")).unwrap();
        let b = queue.request(&InstantLoader, texture("a.png")).unwrap();
        assert_ne!(a, b);
        assert_eq!(queue.drain().len(), 2);
    }
}
