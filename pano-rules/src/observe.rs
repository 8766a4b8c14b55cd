//! Observation hooks for the resolver.
//!
//! The resolver never logs directly. It reports every recoverable condition to
//! an [`Observer`] passed in at construction; [`TracingObserver`] forwards the
//! events to `tracing`, [`NullObserver`] drops them. Resolution results are
//! identical whichever observer is used.

use std::sync::Mutex;

use tracing::{debug, warn};

/// A recoverable condition met during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveEvent<'a> {
    /// An input reference was empty or whitespace-only and was skipped.
    EmptyReference {
        scope: &'a str,
        category: &'static str,
    },
    /// A group listed an empty member, which was skipped.
    EmptyMember {
        scope: &'a str,
        category: &'static str,
        group: &'a str,
    },
    /// An object was found but its record could not produce a value.
    MalformedRecord {
        scope: &'a str,
        category: &'static str,
        name: &'a str,
        detail: &'static str,
    },
    /// A reference ended in an `UNKNOWN:`, `DAG:` or `CYCLE:` marker.
    Unresolved {
        scope: &'a str,
        category: &'static str,
        marker: &'a str,
    },
}

pub trait Observer: Send + Sync {
    fn observe(&self, event: &ResolveEvent<'_>);
}

/// Forwards events to `tracing`: data problems at `warn`, unresolved markers
/// at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &ResolveEvent<'_>) {
        match event {
            ResolveEvent::EmptyReference { scope, category } => {
                warn!(scope, category, "skipping empty reference");
            }
            ResolveEvent::EmptyMember {
                scope,
                category,
                group,
            } => {
                warn!(scope, category, group, "skipping empty group member");
            }
            ResolveEvent::MalformedRecord {
                scope,
                category,
                name,
                detail,
            } => {
                warn!(scope, category, name, detail, "malformed object record");
            }
            ResolveEvent::Unresolved {
                scope,
                category,
                marker,
            } => {
                debug!(scope, category, marker, "reference not statically resolved");
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn observe(&self, _event: &ResolveEvent<'_>) {}
}

/// Keeps a rendered copy of every event. Used by tests and by callers that
/// want to report resolution problems after the fact.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, event: &ResolveEvent<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(format!("{event:?}"));
        }
    }
}
