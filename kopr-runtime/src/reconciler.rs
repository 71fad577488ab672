//! The user-supplied reconciliation callback and its verdict

use crate::{event::EventAction, retry::GenericRetry};
use async_trait::async_trait;
use std::{error::Error as StdError, sync::Arc};

/// What the dispatcher should persist after a reconciliation
///
/// Returned by [`Reconciler::create_or_update`] and interpreted by case
/// analysis at the single dispatch site.
#[derive(Debug, Clone)]
pub enum Update<K> {
    /// Replace the full object under optimistic lock
    Resource(K),
    /// Update only the status subresource
    ///
    /// Does not bump `metadata.resourceVersion` on the main object, so the
    /// apiserver will not emit a spec-change generation for it.
    Status(K),
    /// Replace the object, then update the status of the replace result
    ResourceAndStatus(K),
    /// The world already matches; persist nothing on behalf of the callback
    ///
    /// The dispatcher may still persist a finalizer edit it made itself.
    None,
}

/// Information about the event that triggered a reconciler invocation
#[derive(Debug, Clone)]
pub struct Context {
    action: EventAction,
    retry: GenericRetry,
}

impl Context {
    /// Construct invocation context from the parts of an event
    #[must_use]
    pub fn new(action: EventAction, retry: GenericRetry) -> Self {
        Self { action, retry }
    }

    /// The watch action that triggered this invocation
    #[must_use]
    pub fn action(&self) -> EventAction {
        self.action
    }

    /// The retry policy the event source applies if this invocation fails
    #[must_use]
    pub fn retry(&self) -> &GenericRetry {
        &self.retry
    }
}

/// The reconciliation callback for one custom resource kind
///
/// Both operations must be idempotent: the runtime guarantees at-least-once
/// delivery, and a crashed or failed dispatch is replayed with the same
/// snapshot.
#[async_trait]
pub trait Reconciler<K: Send + Sync>: Send + Sync {
    /// The error type reconciliations fail with
    type Error: StdError + Send + 'static;

    /// Drive the world toward the state declared in the resource
    ///
    /// Invoked for `Added` and `Modified` events once the dispatcher has
    /// ensured the configured finalizer is present on the snapshot. The
    /// verdict decides what, if anything, gets persisted.
    async fn create_or_update(
        &self,
        resource: Arc<K>,
        ctx: &Context,
    ) -> Result<Update<K>, Self::Error>;

    /// Release everything owned on behalf of a terminating resource
    ///
    /// Invoked only when deletion was requested and our finalizer is still
    /// present. Return `true` once cleanup is complete; the dispatcher then
    /// removes the finalizer so the apiserver can finish the delete. Return
    /// `false` to keep the resource in its terminating state until a later
    /// event tries again.
    async fn delete(&self, resource: Arc<K>, ctx: &Context) -> Result<bool, Self::Error>;
}

#[async_trait]
impl<K, T> Reconciler<K> for Arc<T>
where
    K: Send + Sync + 'static,
    T: Reconciler<K> + ?Sized,
{
    type Error = T::Error;

    async fn create_or_update(
        &self,
        resource: Arc<K>,
        ctx: &Context,
    ) -> Result<Update<K>, Self::Error> {
        (**self).create_or_update(resource, ctx).await
    }

    async fn delete(&self, resource: Arc<K>, ctx: &Context) -> Result<bool, Self::Error> {
        (**self).delete(resource, ctx).await
    }
}
