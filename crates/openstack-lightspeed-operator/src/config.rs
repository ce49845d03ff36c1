//! Application scoped configuration of the defaulting engine.

/// The system prompt injected into OpenStack Lightspeed enabled [`OLSConfig`]s.
///
/// [`OLSConfig`]: crate::crd::OLSConfig
pub const OPENSTACK_LIGHTSPEED_SYSTEM_PROMPT: &str = include_str!("../assets/system_prompt.txt");

/// The environment variable holding the image of the OpenStack documentation RAG database.
///
/// Following the OLM convention, `RELATED_IMAGE_*` variables are rewritten to pinned digests when
/// the operator bundle is built for disconnected installations.
pub const OPENSTACK_LIGHTSPEED_RAG_IMAGE_ENV: &str =
    "RELATED_IMAGE_OPENSTACK_LIGHTSPEED_IMAGE_URL_DEFAULT";

/// Immutable configuration shared by all defaulting invocations.
///
/// It is created once at start-up and shared behind an [`Arc`](std::sync::Arc).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultingConfig {
    /// The text set as `spec.ols.querySystemPrompt`.
    pub system_prompt: String,

    /// The name of the environment variable the RAG image is read from.
    pub rag_image_env_var: String,
}

impl Default for DefaultingConfig {
    fn default() -> Self {
        Self {
            system_prompt: OPENSTACK_LIGHTSPEED_SYSTEM_PROMPT.to_owned(),
            rag_image_env_var: OPENSTACK_LIGHTSPEED_RAG_IMAGE_ENV.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_embedded_prompt() {
        let config = DefaultingConfig::default();

        assert!(!config.system_prompt.trim().is_empty());
        assert!(config.system_prompt.starts_with("You are OpenStack Lightspeed"));
        assert_eq!(
            config.rag_image_env_var,
            "RELATED_IMAGE_OPENSTACK_LIGHTSPEED_IMAGE_URL_DEFAULT"
        );
    }
}
