//! The `OLSConfig` resource as seen by this operator.
//!
//! The schema is owned by the OpenShift Lightspeed operator, these are plain re-exports of the
//! upstream definitions from [`lightspeed_api`]. The defaulting engine only touches a few fields of
//! [`OLSSpec`].

pub use lightspeed_api::v1alpha1::{
    OLSConfig, OLSConfigSpec, OLSConfigStatus, OLSDataCollectorSpec, OLSSpec, RAGSpec,
};
