//! The capability a defaulting engine offers to the admission transport.
use std::{any::Any, borrow::Cow};

use kube::{
    Resource,
    core::admission::{self, AdmissionRequest},
};

/// The admission operation which triggered a defaulting invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl From<&admission::Operation> for Operation {
    fn from(value: &admission::Operation) -> Self {
        match value {
            admission::Operation::Create => Self::Create,
            admission::Operation::Update => Self::Update,
            admission::Operation::Delete => Self::Delete,
            admission::Operation::Connect => Self::Connect,
        }
    }
}

/// Request scoped information handed to a [`CustomDefaulter`].
///
/// It only carries plain values, a defaulter never sees transport types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultingContext {
    /// The UID of the admission request.
    pub uid: String,

    /// The name of the object, empty if the name is generated by the API server.
    pub name: String,

    pub operation: Operation,

    /// Whether the request is a dry-run. Defaulting never has side effects, so this is purely
    /// informational.
    pub dry_run: bool,
}

impl<K> From<&AdmissionRequest<K>> for DefaultingContext
where
    K: kube::Resource,
{
    fn from(request: &AdmissionRequest<K>) -> Self {
        Self {
            uid: request.uid.clone(),
            name: request.name.clone(),
            operation: Operation::from(&request.operation),
            dry_run: request.dry_run,
        }
    }
}

/// A type erased Kubernetes object as handed to a [`CustomDefaulter`].
///
/// Implemented for every statically typed [`Resource`].
pub trait AdmissionObject: Any {
    /// The kind of the object, for example `ConfigMap`.
    fn object_kind(&self) -> Cow<'static, str>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<K> AdmissionObject for K
where
    K: Resource<DynamicType = ()> + 'static,
{
    fn object_kind(&self) -> Cow<'static, str> {
        <K as Resource>::kind(&())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Fills in defaults on an object before it is persisted.
///
/// Implementations downcast the [`AdmissionObject`] to the resource they handle and fail with
/// their own error type if the object is of any other type. Any mutation happens in place. The
/// returned error is surfaced to the API server as a denied admission response.
pub trait CustomDefaulter: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn default(
        &self,
        ctx: &DefaultingContext,
        object: &mut dyn AdmissionObject,
    ) -> Result<(), Self::Error>;
}
