//! The mutation seam between the dispatcher and the cluster
//!
//! The dispatcher performs exactly two write shapes, and only through this
//! trait: an optimistic-lock full replace, and a status-subresource update.
//! Keeping the seam this narrow lets tests substitute a recording stub and
//! lets the embedding application decide how writes reach the apiserver.

use async_trait::async_trait;
use std::error::Error as StdError;
use thiserror::Error;

/// Errors surfaced by a [`ResourceWriter`]
///
/// Both variants are retryable from the dispatcher's point of view: a
/// conflict means the snapshot went stale and a subsequent watch event will
/// supersede it, while transport failures are transient by assumption.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The write was rejected because `metadata.resourceVersion` was stale
    #[error("optimistic lock conflict: {0}")]
    Conflict(String),
    /// The request did not complete
    #[error("api request failed: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
}

/// Write access to one custom resource kind
///
/// The sole mutation path of the dispatcher.
#[async_trait]
pub trait ResourceWriter<K>: Send + Sync {
    /// Replace the full object, using its `metadata.resourceVersion` as the
    /// write precondition
    ///
    /// Returns the object as accepted by the server. A failed precondition
    /// is a [`WriteError::Conflict`].
    async fn replace_with_lock(&self, resource: K) -> Result<K, WriteError>;

    /// Update only the `status` subresource of the object
    ///
    /// Status writes do not bump `metadata.generation`, which is what keeps
    /// generation-aware dispatch from reconciling its own status updates.
    async fn update_status(&self, resource: K) -> Result<K, WriteError>;
}

#[async_trait]
impl<K, T> ResourceWriter<K> for std::sync::Arc<T>
where
    K: Send + 'static,
    T: ResourceWriter<K> + ?Sized,
{
    async fn replace_with_lock(&self, resource: K) -> Result<K, WriteError> {
        (**self).replace_with_lock(resource).await
    }

    async fn update_status(&self, resource: K) -> Result<K, WriteError> {
        (**self).update_status(resource).await
    }
}
