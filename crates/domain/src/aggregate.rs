//! Core aggregate and domain event traits.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for serialization and event log filtering.
    fn event_type(&self) -> &'static str;
}

/// Version number for an aggregate, used for optimistic concurrency control.
///
/// Versions start at 1 for the first event and increment by 1 for each
/// subsequent event on an aggregate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for an aggregate with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) for the first event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the version reached after `count` more events.
    pub fn advance(&self, count: usize) -> Self {
        Self(self.0 + count as i64)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for aggregates whose state changes are expressed as events.
///
/// Command methods validate against the current state and return the events
/// to record; `apply` folds those events into the state. Persistence stores
/// the resulting state together with the events, guarded by the version.
pub trait Aggregate: Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the current version of the aggregate.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the store after a successful write.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic:
    /// - Given the same state and event, it must always produce the same new state
    /// - It must not have side effects
    /// - It must not fail (events represent facts that have happened)
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Incremented { by: i32 },
        Reset,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Incremented { .. } => "CounterIncremented",
                CounterEvent::Reset => "CounterReset",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Incremented { by } => self.value += by,
                CounterEvent::Reset => self.value = 0,
            }
        }
    }

    #[test]
    fn apply_events_folds_in_order() {
        let mut counter = Counter::default();
        counter.apply_events(vec![
            CounterEvent::Incremented { by: 3 },
            CounterEvent::Reset,
            CounterEvent::Incremented { by: 2 },
        ]);
        assert_eq!(counter.value, 2);
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            CounterEvent::Incremented { by: 1 }.event_type(),
            "CounterIncremented"
        );
        assert_eq!(CounterEvent::Reset.event_type(), "CounterReset");
    }

    #[test]
    fn version_advances() {
        assert_eq!(Version::initial().next(), Version::first());
        assert_eq!(Version::first().advance(3), Version::new(4));
        assert!(Version::new(2) > Version::first());
    }
}
