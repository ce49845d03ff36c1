//! Defaulting of [`OLSConfig`] resources for OpenStack Lightspeed.
//!
//! An [`OLSConfig`] opts in by carrying the annotation
//! `openstack-lightspeed.openstack.org/enabled: "true"`. For such resources
//!
//! 1. `spec.ols.byokRAGOnly` is set to `true`,
//! 2. `spec.ols.querySystemPrompt` is replaced with the OpenStack Lightspeed system prompt,
//! 3. `spec.ols.rag` is set to the OpenStack documentation RAG image, but only if no RAG database
//!    is configured yet and the image is known from the environment.
//!
//! All other resources are left untouched.
use std::sync::Arc;

use kube::ResourceExt;
use lightspeed_webhook::{AdmissionObject, CustomDefaulter, DefaultingContext};
use snafu::{OptionExt, Snafu};

pub use crate::defaulting::environment::{Environment, ProcessEnvironment};
use crate::{
    config::DefaultingConfig,
    crd::{OLSConfig, RAGSpec},
};

mod environment;

/// The annotation marking an [`OLSConfig`] as managed by OpenStack Lightspeed.
pub const OPENSTACK_LIGHTSPEED_ANNOTATION: &str = "openstack-lightspeed.openstack.org/enabled";

/// The only annotation value enabling defaulting. The comparison is case sensitive.
pub const OPENSTACK_LIGHTSPEED_ANNOTATION_ENABLED: &str = "true";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("expected an OLSConfig but got a {kind}"))]
    UnexpectedObjectType { kind: String },
}

/// Applies the OpenStack Lightspeed defaults to [`OLSConfig`]s.
///
/// The defaulter is stateless apart from the shared [`DefaultingConfig`] and can be called
/// concurrently for any number of admission requests.
#[derive(Clone, Debug)]
pub struct OLSConfigCustomDefaulter<E = ProcessEnvironment> {
    config: Arc<DefaultingConfig>,
    environment: E,
}

impl OLSConfigCustomDefaulter {
    /// Creates a defaulter reading the RAG image from the process environment.
    pub fn new(config: Arc<DefaultingConfig>) -> Self {
        Self::with_environment(config, ProcessEnvironment)
    }
}

impl<E> OLSConfigCustomDefaulter<E>
where
    E: Environment,
{
    pub fn with_environment(config: Arc<DefaultingConfig>, environment: E) -> Self {
        Self {
            config,
            environment,
        }
    }

    /// Applies the defaults to `olsconfig` in place.
    ///
    /// Applying the defaults is idempotent: a second call with the same environment does not
    /// change the resource any further.
    pub fn default_olsconfig(&self, olsconfig: &mut OLSConfig) {
        if !is_openstack_lightspeed_enabled(olsconfig) {
            tracing::debug!(
                olsconfig.name = %olsconfig.name_any(),
                "OLSConfig is not enabled for OpenStack Lightspeed, skipping defaults"
            );
            return;
        }

        let ols = &mut olsconfig.spec.ols_config;
        ols.byok_rag_only = true;
        ols.query_system_prompt.clone_from(&self.config.system_prompt);

        if !ols.rag.is_empty() {
            tracing::debug!(
                rag.count = ols.rag.len(),
                "OLSConfig already configures RAG databases, keeping them"
            );
            return;
        }

        match self.environment.var(&self.config.rag_image_env_var) {
            Some(image) if !image.is_empty() => {
                tracing::debug!(rag.image = %image, "defaulting RAG image");
                ols.rag = vec![RAGSpec {
                    image,
                    ..RAGSpec::default()
                }];
            }
            _ => {
                tracing::debug!(
                    env.name = %self.config.rag_image_env_var,
                    "RAG image environment variable is not set, leaving RAG unconfigured"
                );
            }
        }
    }
}

impl<E> CustomDefaulter for OLSConfigCustomDefaulter<E>
where
    E: Environment,
{
    type Error = Error;

    fn default(
        &self,
        ctx: &DefaultingContext,
        object: &mut dyn AdmissionObject,
    ) -> Result<(), Self::Error> {
        let kind = object.object_kind().into_owned();
        let olsconfig = object
            .as_any_mut()
            .downcast_mut::<OLSConfig>()
            .context(UnexpectedObjectTypeSnafu { kind })?;

        tracing::info!(
            olsconfig.name = %olsconfig.name_any(),
            admission.operation = %ctx.operation,
            admission.dry_run = ctx.dry_run,
            "defaulting OLSConfig"
        );
        self.default_olsconfig(olsconfig);

        Ok(())
    }
}

fn is_openstack_lightspeed_enabled(olsconfig: &OLSConfig) -> bool {
    olsconfig
        .annotations()
        .get(OPENSTACK_LIGHTSPEED_ANNOTATION)
        .is_some_and(|value| value == OPENSTACK_LIGHTSPEED_ANNOTATION_ENABLED)
}
