//! Resource types of the OpenShift Lightspeed operator.
//!
//! The [`v1alpha1::OLSConfig`] custom resource is owned by the upstream OpenShift Lightspeed
//! operator. This crate vendors its data definitions, so that operators building on top of it can
//! depend on the public shape of the schema instead of redefining it. Validation of the resource is
//! left to the CustomResourceDefinition and the upstream operator.

pub mod v1alpha1;

/// The API group of all resources in this crate.
pub const GROUP: &str = "ols.openshift.io";
