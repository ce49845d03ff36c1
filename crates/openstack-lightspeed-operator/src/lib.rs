//! OpenStack Lightspeed operator.
//!
//! OpenStack Lightspeed builds on the OpenShift Lightspeed operator. Instead of reconciling its own
//! resources, it defaults the upstream [`OLSConfig`](crd::OLSConfig) with a mutating admission
//! webhook, see [`defaulting`] for the rules.
pub mod cli;
pub mod config;
pub mod crd;
pub mod defaulting;
pub mod webhook;

/// The name of the operator, used as service name in logs.
pub const OPERATOR_NAME: &str = "openstack-lightspeed-operator";
