//! Event-type to handler routing.

use crate::app::state::SessionState;
use crate::irc::event::{Event, EventKind};

pub type Handler = fn(&mut SessionState, &Event);

/// Ordered `(kind, handler)` table with a fallback.
///
/// Built once before the session starts; the first entry whose kind matches
/// wins.
pub struct Dispatcher {
    handlers: Vec<(EventKind, Handler)>,
    fallback: Handler,
}

impl Dispatcher {
    pub fn new(fallback: Handler) -> Self {
        Self {
            handlers: Vec::new(),
            fallback,
        }
    }

    pub fn register(mut self, kind: EventKind, handler: Handler) -> Self {
        self.handlers.push((kind, handler));
        self
    }

    pub fn dispatch(&self, state: &mut SessionState, event: &Event) {
        let handler = self
            .handlers
            .iter()
            .find(|(kind, _)| *kind == event.kind)
            .map(|(_, handler)| *handler)
            .unwrap_or(self.fallback);
        handler(state, event);
    }
}
