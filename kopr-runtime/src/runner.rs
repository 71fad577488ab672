//! Per-uid serializing event source driver
//!
//! The [`Dispatcher`](crate::Dispatcher) requires that events for one uid
//! are delivered strictly in order and one at a time; across uids it allows
//! arbitrary concurrency. The [`Runner`] provides that contract with a keyed
//! worker pool: one FIFO queue per uid, a bounded set of workers draining
//! queues non-preemptively. It also owns the retry side of the event
//! contract: a failed dispatch is re-delivered after the delay produced by
//! the event's own [`GenericRetry`](crate::GenericRetry) execution, unless a
//! newer event for the same uid has arrived in the meantime.

use crate::{
    api::ResourceWriter,
    dispatcher::Dispatcher,
    event::Event,
    reconciler::Reconciler,
};
use ahash::{AHashMap, AHashSet};
use backoff::backoff::Backoff;
use futures::future;
use kopr_core::{Resource, ResourceExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

struct State<K> {
    /// FIFO event queue per uid; entries are removed when drained
    queues: AHashMap<String, VecDeque<Event<K>>>,
    /// Uids with queued events that no worker currently owns
    ready: VecDeque<String>,
    /// Uids currently owned by a worker
    busy: AHashSet<String>,
    closed: bool,
}

enum Work<K> {
    Deliver(String, Event<K>),
    Wait,
    Respin,
    Done,
}

/// Drives a [`Dispatcher`] with per-uid FIFO delivery and retry
///
/// Events are accepted through [`enqueue`](Runner::enqueue) from any thread;
/// [`run`](Runner::run) drains them with a bounded worker pool and returns
/// once the runner has been [`close`](Runner::close)d and all queues are
/// empty.
pub struct Runner<K, R, W> {
    dispatcher: Dispatcher<K, R, W>,
    workers: usize,
    state: Mutex<State<K>>,
    wake: Notify,
}

impl<K, R, W> Runner<K, R, W>
where
    K: Resource + Clone + Send + Sync,
    R: Reconciler<K>,
    W: ResourceWriter<K>,
{
    /// Create a runner draining events with at most `workers` concurrent uids
    pub fn new(dispatcher: Dispatcher<K, R, W>, workers: usize) -> Self {
        Self {
            dispatcher,
            workers: workers.max(1),
            state: Mutex::new(State {
                queues: AHashMap::new(),
                ready: VecDeque::new(),
                busy: AHashSet::new(),
                closed: false,
            }),
            wake: Notify::new(),
        }
    }

    /// Queue an event for delivery
    ///
    /// # Errors
    ///
    /// Returns the event back when it carries no `metadata.uid` (there is no
    /// queue to serialize it on) or when the runner is already closed.
    pub fn enqueue(&self, event: Event<K>) -> Result<(), Event<K>> {
        let Some(uid) = event.resource.uid() else {
            warn!("rejecting event without uid");
            return Err(event);
        };
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(event);
            }
            state.queues.entry(uid.clone()).or_default().push_back(event);
            if !state.busy.contains(&uid) && !state.ready.contains(&uid) {
                state.ready.push_back(uid);
            }
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Stop accepting events; [`run`](Runner::run) returns once drained
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.wake.notify_one();
    }

    /// Drain queued events until closed and empty
    ///
    /// All workers run inside this future; nothing is spawned.
    pub async fn run(&self) {
        future::join_all((0..self.workers).map(|_| self.worker())).await;
    }

    async fn worker(&self) {
        loop {
            let notified = self.wake.notified();
            let work = self.next_work();
            match work {
                Work::Deliver(uid, event) => {
                    self.deliver(&uid, event).await;
                    self.release(&uid);
                }
                Work::Respin => {}
                Work::Wait => notified.await,
                Work::Done => {
                    // cascade the shutdown to the next waiting worker
                    self.wake.notify_one();
                    return;
                }
            }
        }
    }

    fn next_work(&self) -> Work<K> {
        let mut state = self.state.lock();
        if let Some(uid) = state.ready.pop_front() {
            let event = state.queues.get_mut(&uid).and_then(VecDeque::pop_front);
            match event {
                Some(event) => {
                    state.busy.insert(uid.clone());
                    if !state.ready.is_empty() {
                        // more uids are runnable, recruit another worker
                        self.wake.notify_one();
                    }
                    Work::Deliver(uid, event)
                }
                None => {
                    state.queues.remove(&uid);
                    Work::Respin
                }
            }
        } else if state.closed && state.busy.is_empty() && state.queues.is_empty() {
            Work::Done
        } else {
            Work::Wait
        }
    }

    fn release(&self, uid: &str) {
        let mut state = self.state.lock();
        state.busy.remove(uid);
        let has_more = state.queues.get(uid).is_some_and(|queue| !queue.is_empty());
        if has_more {
            state.ready.push_back(uid.to_string());
        } else {
            state.queues.remove(uid);
        }
        drop(state);
        self.wake.notify_one();
    }

    /// Deliver one event, re-delivering per its retry policy on failure
    async fn deliver(&self, uid: &str, event: Event<K>) {
        let mut execution = event.retry.execution();
        loop {
            match self.dispatcher.handle_event(event.clone()).await {
                Ok(()) => return,
                Err(err) if err.is_fatal() => {
                    error!(object.uid = %uid, error = %err, "dropping event after fatal dispatch error");
                    return;
                }
                Err(err) => {
                    let Some(delay) = execution.next_backoff() else {
                        error!(object.uid = %uid, error = %err, "retry policy exhausted, dropping event");
                        return;
                    };
                    if self.superseded(uid) {
                        debug!(object.uid = %uid, "newer event queued, abandoning retries");
                        return;
                    }
                    warn!(object.uid = %uid, error = %err, ?delay, "dispatch failed, will retry");
                    tokio::time::sleep(delay).await;
                    if self.superseded(uid) {
                        debug!(object.uid = %uid, "newer event queued, abandoning retries");
                        return;
                    }
                }
            }
        }
    }

    /// Whether a fresher event for this uid is already queued
    fn superseded(&self, uid: &str) -> bool {
        self.state
            .lock()
            .queues
            .get(uid)
            .is_some_and(|queue| !queue.is_empty())
    }
}
