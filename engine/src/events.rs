//! Lifecycle events.
//!
//! Listeners are called in registration order. For the cancellable events
//! (`beforeSave`, `beforeDelete`, `beforeRules`, `afterRules`) the first
//! listener that returns [`Flow::Stop`] ends dispatch and its value becomes
//! the outcome of the operation.

use crate::{
    query::Query, rules::RuleMode, DeleteOptions, FinderOptions, MarshalOptions, Record,
    SaveOptions,
};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Event names, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    BeforeMarshal,
    BeforeFind,
    BeforeRules,
    AfterRules,
    BeforeSave,
    AfterSave,
    AfterSaveCommit,
    BeforeDelete,
    AfterDelete,
    AfterDeleteCommit,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::BeforeMarshal => "beforeMarshal",
            Event::BeforeFind => "beforeFind",
            Event::BeforeRules => "beforeRules",
            Event::AfterRules => "afterRules",
            Event::BeforeSave => "beforeSave",
            Event::AfterSave => "afterSave",
            Event::AfterSaveCommit => "afterSaveCommit",
            Event::BeforeDelete => "beforeDelete",
            Event::AfterDelete => "afterDelete",
            Event::AfterDeleteCommit => "afterDeleteCommit",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether dispatch continues after a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<T> {
    Continue,
    Stop(T),
}

/// Outcome of dispatching a cancellable event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventResult<T> {
    pub stopped: bool,
    pub result: Option<T>,
}

impl<T> EventResult<T> {
    fn completed() -> Self {
        Self {
            stopped: false,
            result: None,
        }
    }
}

/// Observer of repository lifecycle events. Every hook defaults to a no-op.
pub trait Listener: Send + Sync {
    /// Raw data about to be marshalled into a record.
    fn before_marshal(&self, _data: &mut Map<String, Value>, _options: &MarshalOptions) {}

    /// A read query built by a finder, before it runs.
    fn before_find(&self, _query: &mut Query<'_>, _options: &FinderOptions) {}

    /// Stop with `Some(record)` to report a save as done, or `None` to fail it.
    fn before_save(&self, _record: &Record, _options: &SaveOptions) -> Flow<Option<Record>> {
        Flow::Continue
    }

    fn after_save(&self, _record: &Record, _options: &SaveOptions) {}

    fn after_save_commit(&self, _record: &Record, _options: &SaveOptions) {}

    fn before_delete(&self, _record: &Record, _options: &DeleteOptions) -> Flow<bool> {
        Flow::Continue
    }

    fn after_delete(&self, _record: &Record, _options: &DeleteOptions) {}

    fn after_delete_commit(&self, _record: &Record, _options: &DeleteOptions) {}

    fn before_rules(&self, _record: &Record, _mode: RuleMode, _options: &SaveOptions) -> Flow<bool> {
        Flow::Continue
    }

    fn after_rules(
        &self,
        _record: &Record,
        _mode: RuleMode,
        _result: bool,
        _options: &SaveOptions,
    ) -> Flow<bool> {
        Flow::Continue
    }
}

/// Ordered set of listeners.
///
/// Thread-safe and can be shared across repositories via `Arc`.
#[derive(Default)]
pub struct EventManager {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn register(&self, listener: Arc<dyn Listener>) {
        self.listeners.write().push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    // Listeners may register more listeners, so dispatch never holds the lock.
    fn snapshot(&self) -> Vec<Arc<dyn Listener>> {
        self.listeners.read().clone()
    }

    /// Dispatch a cancellable event.
    pub fn dispatch<T, F>(&self, event: Event, mut handler: F) -> EventResult<T>
    where
        F: FnMut(&dyn Listener) -> Flow<T>,
    {
        for listener in self.snapshot() {
            if let Flow::Stop(result) = handler(listener.as_ref()) {
                tracing::debug!(event = %event, "event stopped by listener");
                return EventResult {
                    stopped: true,
                    result: Some(result),
                };
            }
        }
        EventResult::completed()
    }

    /// Dispatch a notification every listener sees.
    pub fn notify<F>(&self, event: Event, mut handler: F)
    where
        F: FnMut(&dyn Listener),
    {
        let listeners = self.snapshot();
        tracing::trace!(event = %event, listeners = listeners.len(), "event dispatched");
        for listener in listeners {
            handler(listener.as_ref());
        }
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        stop: bool,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Listener for Recorder {
        fn before_delete(&self, _record: &Record, _options: &DeleteOptions) -> Flow<bool> {
            self.seen.lock().push(self.name);
            if self.stop {
                Flow::Stop(false)
            } else {
                Flow::Continue
            }
        }
    }

    #[test]
    fn first_stop_wins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let events = EventManager::new();
        for (name, stop) in [("a", false), ("b", true), ("c", true)] {
            events.register(Arc::new(Recorder {
                name,
                stop,
                seen: Arc::clone(&seen),
            }));
        }

        let record = Record::new();
        let options = DeleteOptions::default();
        let result = events.dispatch(Event::BeforeDelete, |l| l.before_delete(&record, &options));

        assert!(result.stopped);
        assert_eq!(result.result, Some(false));
        assert_eq!(*seen.lock(), vec!["a", "b"]);
    }

    #[test]
    fn completed_dispatch() {
        let events = EventManager::new();
        let record = Record::new();
        let options = DeleteOptions::default();
        let result = events.dispatch(Event::BeforeDelete, |l| l.before_delete(&record, &options));
        assert!(!result.stopped);
        assert!(result.result.is_none());
    }
}
