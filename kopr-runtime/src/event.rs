//! The unit of work consumed by the [`Dispatcher`](crate::Dispatcher)

use crate::retry::GenericRetry;

/// The watch action that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// An object was created
    Added,
    /// An object was updated
    Modified,
    /// An object was removed from the apiserver
    ///
    /// By the time this arrives the object is gone, so no reconciliation is
    /// possible. Do not rely on it for cleanup; use finalizers instead.
    Deleted,
    /// The watch stream reported an error for this object
    Error,
}

/// A single dispatched event: the observed action, the resource snapshot at
/// the moment the event was emitted, and the retry policy the event source
/// applies when dispatch fails.
#[derive(Debug, Clone)]
pub struct Event<K> {
    /// The watch action
    pub action: EventAction,
    /// The resource as observed when the event was emitted
    pub resource: K,
    /// The schedule for re-delivering this event on failure
    pub retry: GenericRetry,
}

impl<K> Event<K> {
    /// Construct an event carrying the given snapshot and retry policy
    pub fn new(action: EventAction, resource: K, retry: GenericRetry) -> Self {
        Self {
            action,
            resource,
            retry,
        }
    }
}
