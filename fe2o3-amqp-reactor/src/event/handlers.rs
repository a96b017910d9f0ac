use std::{collections::HashMap, fmt::Debug, sync::Arc};

use super::{EventContext, EventKind};

/// An application handler
pub type Handler = Arc<dyn Fn(&mut EventContext<'_>) + Send + Sync>;

#[derive(Clone)]
struct Entry {
    handler: Handler,
    once: bool,
}

/// Handlers registered at one scope
#[derive(Clone, Default)]
pub struct Handlers {
    entries: HashMap<EventKind, Vec<Entry>>,
}

impl Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self
            .entries
            .iter()
            .map(|(kind, entries)| (kind.as_str(), entries.len()))
            .collect();
        kinds.sort_unstable();
        f.debug_struct("Handlers").field("entries", &kinds).finish()
    }
}

impl Handlers {
    /// Registers a handler that fires on every event of `kind`
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.push(kind, Arc::new(handler), false)
    }

    /// Registers a handler that is removed after it fired once
    pub fn once<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.push(kind, Arc::new(handler), true)
    }

    fn push(&mut self, kind: EventKind, handler: Handler, once: bool) {
        self.entries
            .entry(kind)
            .or_default()
            .push(Entry { handler, once })
    }

    /// Whether any handler is registered for `kind`
    pub fn contains(&self, kind: EventKind) -> bool {
        self.entries
            .get(&kind)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    /// Removes every handler of `kind`
    pub fn remove(&mut self, kind: EventKind) {
        self.entries.remove(&kind);
    }

    /// Takes the handlers to invoke for one event of `kind`, dropping the
    /// `once` entries
    pub(crate) fn take(&mut self, kind: EventKind) -> Vec<Handler> {
        let Some(entries) = self.entries.get_mut(&kind) else {
            return Vec::new();
        };
        let handlers = entries.iter().map(|e| e.handler.clone()).collect();
        entries.retain(|e| !e.once);
        if entries.is_empty() {
            self.entries.remove(&kind);
        }
        handlers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_handler_is_taken_only_once() {
        let mut handlers = Handlers::default();
        handlers.on(EventKind::Message, |_| {});
        handlers.once(EventKind::Message, |_| {});
        handlers.once(EventKind::Settled, |_| {});

        assert_eq!(handlers.take(EventKind::Message).len(), 2);
        assert_eq!(handlers.take(EventKind::Message).len(), 1);

        assert!(handlers.contains(EventKind::Settled));
        assert_eq!(handlers.take(EventKind::Settled).len(), 1);
        assert!(!handlers.contains(EventKind::Settled));
        assert!(handlers.take(EventKind::Settled).is_empty());
    }
}
