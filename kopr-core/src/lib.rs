//! Core traits and types for the kopr operator runtime
//!
//! This crate contains the resource-shaped building blocks shared by the
//! runtime and by operator authors: a generic [`Object`] representation for
//! custom resources, and the [`Resource`]/[`ResourceExt`] accessor traits
//! over standard Kubernetes [`ObjectMeta`](k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod metadata;
pub use metadata::TypeMeta;

pub mod object;
pub use object::{NotUsed, Object};

mod resource;
pub use resource::{Resource, ResourceExt};
