use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// An accessor trait for objects carrying standard Kubernetes metadata.
///
/// Implemented by [`Object`](crate::Object) for the generic custom resource
/// shape, and implementable by hand for bespoke resource structs. The
/// runtime only ever touches a resource through this trait (and the
/// [`ResourceExt`] helpers); the `spec` and `status` payloads stay opaque.
pub trait Resource {
    /// Metadata that all persisted resources must have
    fn meta(&self) -> &ObjectMeta;
    /// Metadata that all persisted resources must have
    fn meta_mut(&mut self) -> &mut ObjectMeta;
}

/// Helper methods for the metadata fields the runtime consumes.
pub trait ResourceExt: Resource {
    /// Unique ID of the object instance
    ///
    /// Deleting the object and recreating it under the same name produces
    /// a different uid.
    fn uid(&self) -> Option<String>;
    /// The generation of the spec, incremented by the apiserver on every
    /// spec change
    fn generation(&self) -> Option<i64>;
    /// The opaque resource version used for optimistic concurrency
    fn resource_version(&self) -> Option<String>;
    /// The object name, or an empty string when unset
    fn name_any(&self) -> String;
    /// Returns resource finalizers
    fn finalizers(&self) -> &[String];
    /// Provides mutable access to the finalizers
    fn finalizers_mut(&mut self) -> &mut Vec<String>;
    /// Whether the named finalizer is present on the object
    fn has_finalizer(&self, name: &str) -> bool;
    /// Whether deletion has been requested for the object
    ///
    /// The apiserver sets `metadata.deletionTimestamp` when deletion is
    /// requested and keeps the object around until all finalizers are gone.
    fn is_being_deleted(&self) -> bool;
}

impl<K: Resource> ResourceExt for K {
    fn uid(&self) -> Option<String> {
        self.meta().uid.clone()
    }

    fn generation(&self) -> Option<i64> {
        self.meta().generation
    }

    fn resource_version(&self) -> Option<String> {
        self.meta().resource_version.clone()
    }

    fn name_any(&self) -> String {
        self.meta().name.clone().unwrap_or_default()
    }

    fn finalizers(&self) -> &[String] {
        self.meta().finalizers.as_deref().unwrap_or_default()
    }

    fn finalizers_mut(&mut self) -> &mut Vec<String> {
        self.meta_mut().finalizers.get_or_insert_with(Vec::new)
    }

    fn has_finalizer(&self, name: &str) -> bool {
        self.finalizers().iter().any(|f| f == name)
    }

    fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }
}
