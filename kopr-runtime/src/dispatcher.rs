//! Turns watch events into reconciler invocations and persisted verdicts

use crate::{
    api::ResourceWriter,
    cache::GenerationCache,
    event::{Event, EventAction},
    reconciler::{Context, Reconciler, Update},
    WriteError,
};
use kopr_core::{Resource, ResourceExt};
use std::{error::Error as StdError, marker::PhantomData, sync::Arc};
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

/// Errors produced by a single [`Dispatcher::handle_event`] call
#[derive(Debug, Error)]
pub enum Error<ReconcilerErr>
where
    ReconcilerErr: StdError + 'static,
{
    /// The reconciler failed while applying an object
    #[error("failed to apply object: {0}")]
    ApplyFailed(#[source] ReconcilerErr),
    /// The reconciler failed while cleaning up a terminating object
    #[error("failed to clean up object: {0}")]
    CleanupFailed(#[source] ReconcilerErr),
    /// Persisting a verdict or a finalizer edit failed
    #[error("failed to persist object: {0}")]
    WriteFailed(#[from] WriteError),
    /// The watch stream emitted an error event for the object
    #[error("error event received from watch stream")]
    EventStream,
    /// The object carries no `metadata.uid`
    #[error("object has no uid")]
    MissingUid,
}

impl<ReconcilerErr> Error<ReconcilerErr>
where
    ReconcilerErr: StdError + 'static,
{
    /// Whether the failure is a programming error that no retry can fix
    ///
    /// Event sources should drop the event instead of applying its retry
    /// policy.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingUid)
    }
}

/// Declaration of one controller instance
///
/// ```
/// use kopr_runtime::Config;
/// let config = Config::new("foos.example.com").generation_aware(false);
/// assert_eq!(config.finalizer(), "foos.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The custom resource kind this controller handles
    pub crd_name: String,
    /// Finalizer added to managed resources; `crd_name` when unset
    pub finalizer_name: Option<String>,
    /// Whether already-reconciled generations are skipped
    pub generation_aware: bool,
}

impl Config {
    /// Declare a controller for the named custom resource kind
    #[must_use]
    pub fn new(crd_name: impl Into<String>) -> Self {
        Self {
            crd_name: crd_name.into(),
            finalizer_name: None,
            generation_aware: true,
        }
    }

    /// Override the finalizer name
    #[must_use]
    pub fn finalizer_name(mut self, name: impl Into<String>) -> Self {
        self.finalizer_name = Some(name.into());
        self
    }

    /// Enable or disable the generation gate
    #[must_use]
    pub fn generation_aware(mut self, aware: bool) -> Self {
        self.generation_aware = aware;
        self
    }

    /// The effective finalizer name
    #[must_use]
    pub fn finalizer(&self) -> &str {
        self.finalizer_name.as_deref().unwrap_or(&self.crd_name)
    }
}

/// The event-dispatch state machine for one controller instance
///
/// Consumes [`Event`]s one at a time, decides between the reconcile and the
/// deletion path, keeps the configured finalizer present on live objects,
/// persists the reconciler's [`Update`] verdict through the
/// [`ResourceWriter`], and records successfully reconciled generations.
///
/// [`handle_event`](Dispatcher::handle_event) never spawns and never sleeps;
/// ordering per uid and retry delays are the event source's concern (see
/// [`Runner`](crate::Runner)). Events for distinct uids may be dispatched
/// concurrently from separate tasks.
pub struct Dispatcher<K, R, W> {
    reconciler: R,
    writer: W,
    finalizer: String,
    cache: GenerationCache,
    _object: PhantomData<fn() -> K>,
}

impl<K, R, W> Dispatcher<K, R, W>
where
    K: Resource + Clone + Send + Sync,
    R: Reconciler<K>,
    W: ResourceWriter<K>,
{
    /// Create a dispatcher with an explicit finalizer name
    pub fn new(
        reconciler: R,
        finalizer: impl Into<String>,
        writer: W,
        generation_aware: bool,
    ) -> Self {
        Self {
            reconciler,
            writer,
            finalizer: finalizer.into(),
            cache: GenerationCache::new(generation_aware),
            _object: PhantomData,
        }
    }

    /// Create a dispatcher from a controller [`Config`]
    pub fn with_config(reconciler: R, writer: W, config: &Config) -> Self {
        Self::new(
            reconciler,
            config.finalizer(),
            writer,
            config.generation_aware,
        )
    }

    /// Dispatch a single event
    ///
    /// Straight-line per call: the only suspension points are the reconciler
    /// and the writer. Errors propagate to the caller without touching the
    /// generation cache, so a failed dispatch is replayable.
    ///
    /// # Errors
    ///
    /// Reconciler failures surface as [`Error::ApplyFailed`] or
    /// [`Error::CleanupFailed`], write failures as [`Error::WriteFailed`];
    /// all three are retryable. [`Error::MissingUid`] is fatal.
    pub async fn handle_event(&self, event: Event<K>) -> Result<(), Error<R::Error>> {
        let Event {
            action,
            resource,
            retry,
        } = event;
        let uid = resource.uid().ok_or(Error::MissingUid)?;

        match action {
            EventAction::Error => {
                warn!(object.uid = %uid, "watch stream emitted an error event");
                return Err(Error::EventStream);
            }
            EventAction::Deleted => {
                // the object is gone from the apiserver; nothing to reconcile
                debug!(object.uid = %uid, "object deleted by the apiserver");
                return Ok(());
            }
            EventAction::Added | EventAction::Modified => {}
        }

        let generation = resource.generation().unwrap_or_default();
        if !self.cache.should_process(&uid, generation) {
            debug!(object.uid = %uid, generation, "generation already reconciled, skipping");
            return Ok(());
        }

        let ctx = Context::new(action, retry);
        let span = info_span!(
            "reconciling object",
            object.name = %resource.name_any(),
            object.uid = %uid,
            ?action,
        );
        if resource.is_being_deleted() {
            self.dispatch_delete(resource, &ctx).instrument(span).await?;
        } else {
            self.dispatch_apply(resource, &ctx).instrument(span).await?;
        }
        self.cache.mark_processed(&uid, generation);
        Ok(())
    }

    async fn dispatch_delete(&self, resource: K, ctx: &Context) -> Result<(), Error<R::Error>> {
        if !resource.has_finalizer(&self.finalizer) {
            // some other controller (or none) owns the terminal step
            debug!("terminating object does not carry our finalizer, ignoring");
            return Ok(());
        }
        let obj = Arc::new(resource);
        let finished = self
            .reconciler
            .delete(obj.clone(), ctx)
            .await
            .map_err(Error::CleanupFailed)?;
        if !finished {
            debug!("cleanup not finished, keeping finalizer");
            return Ok(());
        }
        let mut updated = (*obj).clone();
        updated.finalizers_mut().retain(|f| f != &self.finalizer);
        self.writer.replace_with_lock(updated).await?;
        debug!(finalizer = %self.finalizer, "removed finalizer after cleanup");
        Ok(())
    }

    async fn dispatch_apply(&self, mut resource: K, ctx: &Context) -> Result<(), Error<R::Error>> {
        // the reconciler must observe the object in the form that will be
        // persisted, and the finalizer must be in place before any work that
        // would need undoing on deletion
        let added_finalizer = if resource.has_finalizer(&self.finalizer) {
            false
        } else {
            resource.finalizers_mut().push(self.finalizer.clone());
            true
        };
        let obj = Arc::new(resource);
        let verdict = self
            .reconciler
            .create_or_update(obj.clone(), ctx)
            .await
            .map_err(Error::ApplyFailed)?;
        match verdict {
            Update::Resource(updated) => {
                self.writer.replace_with_lock(updated).await?;
            }
            Update::Status(updated) => {
                self.writer.update_status(updated).await?;
            }
            Update::ResourceAndStatus(updated) => {
                let replaced = self.writer.replace_with_lock(updated).await?;
                self.writer.update_status(replaced).await?;
            }
            Update::None => {
                if added_finalizer {
                    self.writer.replace_with_lock((*obj).clone()).await?;
                }
            }
        }
        Ok(())
    }
}
