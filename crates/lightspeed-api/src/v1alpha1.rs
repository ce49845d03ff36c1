//! The `v1alpha1` version of the [`OLSConfig`] resource.
//!
//! [`OLSConfig`] is a cluster scoped singleton, which configures the Lightspeed service: the LLM
//! providers it talks to, the retrieval-augmented generation (RAG) databases it uses and how
//! queries are processed.
use k8s_openapi::{
    api::core::v1::LocalObjectReference, apimachinery::pkg::apis::meta::v1::Condition,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// OLSConfig is the Schema for the olsconfigs API.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "ols.openshift.io",
    version = "v1alpha1",
    kind = "OLSConfig",
    plural = "olsconfigs",
    status = "OLSConfigStatus",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct OLSConfigSpec {
    /// The LLM providers and models available to the Lightspeed service.
    #[serde(default, rename = "llm")]
    pub llm_config: LLMSpec,

    /// Configuration of the Lightspeed service itself.
    #[serde(default, rename = "ols")]
    pub ols_config: OLSSpec,

    /// Configuration of the data collector sidecar.
    #[serde(default, rename = "olsDataCollector")]
    pub ols_data_collector_config: OLSDataCollectorSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LLMSpec {
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

/// A single LLM provider, together with the models which should be used from it.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Provider name.
    pub name: String,

    /// Provider API URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// The name of the secret object that stores API provider credentials.
    pub credentials_secret_ref: LocalObjectReference,

    /// List of models from the provider.
    #[serde(default)]
    pub models: Vec<ModelSpec>,

    /// Provider type.
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// Azure OpenAI deployment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,

    /// API version of the provider, only used by Azure OpenAI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Watsonx project ID.
    #[serde(default, rename = "projectID", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// The kind of API an LLM provider offers.
///
/// Provider types added upstream after this schema was vendored are decoded as
/// [`ProviderType::Unknown`], so such resources can still be admitted.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub enum ProviderType {
    #[serde(rename = "azure_openai")]
    AzureOpenAi,

    #[serde(rename = "bam")]
    Bam,

    #[default]
    #[serde(rename = "openai")]
    OpenAi,

    #[serde(rename = "watsonx")]
    Watsonx,

    #[serde(rename = "rhoai_vllm")]
    RhoaiVllm,

    #[serde(rename = "rhelai_vllm")]
    RhelaiVllm,

    #[serde(other)]
    #[schemars(skip)]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// Model name.
    pub name: String,

    /// Model API URL, overrides the provider URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Defines the model's context window size, in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ModelParametersSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParametersSpec {
    /// Max number of tokens reserved for the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_for_response: Option<u32>,
}

/// Configuration of the Lightspeed service.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OLSSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_cache: Option<ConversationCacheSpec>,

    /// Log level of the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Default model name used when a query does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Default provider name used when a query does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    #[serde(default, rename = "deployment", skip_serializing_if = "Option::is_none")]
    pub deployment_config: Option<DeploymentConfig>,

    /// Regular expressions applied to queries before they are sent to the LLM.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_filters: Vec<QueryFiltersSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_collection: Option<UserDataCollectionSpec>,

    /// ConfigMap containing additional CA certificates the service should trust.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_ca_config_map_ref: Option<LocalObjectReference>,

    /// Enable introspection features.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub introspection_enabled: bool,

    /// RAG databases, each shipped as a container image.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rag: Vec<RAGSpec>,

    /// Only use the BYOK RAG databases from [`Self::rag`], ignoring the built-in OpenShift
    /// documentation.
    #[serde(default, rename = "byokRAGOnly", skip_serializing_if = "std::ops::Not::not")]
    pub byok_rag_only: bool,

    /// System prompt prepended to every query. An empty string means the built-in prompt is used.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query_system_prompt: String,
}

/// A RAG database shipped inside a container image.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RAGSpec {
    /// The path to the RAG database inside of the container image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<String>,

    /// The Index ID of the RAG database.
    #[serde(default, rename = "indexID", skip_serializing_if = "Option::is_none")]
    pub index_id: Option<String>,

    /// The URL of the container image to use as a RAG source.
    pub image: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,

    #[serde(other)]
    #[schemars(skip)]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCacheSpec {
    #[serde(rename = "type")]
    pub cache_type: CacheType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresSpec>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    #[default]
    Postgres,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgresSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_buffers: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// Number of replicas of the Lightspeed service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFiltersSpec {
    pub name: String,
    pub pattern: String,
    pub replace_with: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataCollectionSpec {
    #[serde(default)]
    pub feedback_disabled: bool,

    #[serde(default)]
    pub transcripts_disabled: bool,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OLSDataCollectorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
}

/// OLSConfigStatus defines the observed state of the Lightspeed deployment.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OLSConfigStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_status: Option<OverallStatus>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub enum OverallStatus {
    Ready,
    NotReady,

    #[serde(other)]
    #[schemars(skip)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use kube::{CustomResourceExt, ResourceExt};
    use rstest::rstest;

    use super::*;

    #[test]
    fn deserialize_minimal() {
        let input = indoc! {r#"
            apiVersion: ols.openshift.io/v1alpha1
            kind: OLSConfig
            metadata:
              name: cluster
            spec:
              llm:
                providers: []
        "#};

        let olsconfig: OLSConfig = serde_yaml::from_str(input).expect("invalid test input");

        assert_eq!(olsconfig.name_any(), "cluster");
        assert!(!olsconfig.spec.ols_config.byok_rag_only);
        assert!(olsconfig.spec.ols_config.query_system_prompt.is_empty());
        assert!(olsconfig.spec.ols_config.rag.is_empty());
    }

    #[test]
    fn deserialize_rag_and_prompt() {
        let input = indoc! {r#"
            apiVersion: ols.openshift.io/v1alpha1
            kind: OLSConfig
            metadata:
              name: cluster
              annotations:
                example.com/enabled: "true"
            spec:
              llm:
                providers:
                  - name: openai
                    type: openai
                    url: https://api.openai.com/v1
                    credentialsSecretRef:
                      name: openai-credentials
                    models:
                      - name: gpt-4o-mini
                        contextWindowSize: 128000
              ols:
                defaultModel: gpt-4o-mini
                defaultProvider: openai
                logLevel: DEBUG
                byokRAGOnly: true
                querySystemPrompt: You are a helpful assistant.
                rag:
                  - image: quay.io/existing/rag:v1
                    indexPath: /rag/vector_db
                    indexID: os-docs
        "#};

        let olsconfig: OLSConfig = serde_yaml::from_str(input).expect("invalid test input");
        let ols = &olsconfig.spec.ols_config;

        assert!(ols.byok_rag_only);
        assert_eq!(ols.query_system_prompt, "You are a helpful assistant.");
        assert_eq!(ols.log_level, Some(LogLevel::Debug));
        assert_eq!(ols.rag, vec![RAGSpec {
            index_path: Some("/rag/vector_db".to_owned()),
            index_id: Some("os-docs".to_owned()),
            image: "quay.io/existing/rag:v1".to_owned(),
        }]);

        let provider = &olsconfig.spec.llm_config.providers[0];
        assert_eq!(provider.provider_type, ProviderType::OpenAi);
        assert_eq!(provider.models[0].context_window_size, Some(128_000));
    }

    #[test]
    fn deserialize_unmodeled_enum_values() {
        let input = indoc! {r#"
            apiVersion: ols.openshift.io/v1alpha1
            kind: OLSConfig
            metadata:
              name: cluster
            spec:
              llm:
                providers:
                  - name: fake
                    type: fake_provider
                    credentialsSecretRef:
                      name: fake-credentials
              ols:
                logLevel: TRACE
            status:
              overallStatus: Degraded
        "#};

        let olsconfig: OLSConfig = serde_yaml::from_str(input).expect("invalid test input");

        assert_eq!(
            olsconfig.spec.llm_config.providers[0].provider_type,
            ProviderType::Unknown
        );
        assert_eq!(olsconfig.spec.ols_config.log_level, Some(LogLevel::Unknown));
        assert_eq!(
            olsconfig.status.and_then(|status| status.overall_status),
            Some(OverallStatus::Unknown)
        );
    }

    #[rstest]
    #[case(false, "", false)]
    #[case(true, "", true)]
    #[case(false, "prompt", true)]
    fn unset_fields_are_omitted(
        #[case] byok_rag_only: bool,
        #[case] query_system_prompt: &str,
        #[case] expect_ols_fields: bool,
    ) {
        let spec = OLSConfigSpec {
            ols_config: OLSSpec {
                byok_rag_only,
                query_system_prompt: query_system_prompt.to_owned(),
                ..Default::default()
            },
            ..Default::default()
        };

        let value = serde_json::to_value(&spec).expect("spec must serialize");
        let ols = value["ols"].as_object().expect("ols must be an object");

        assert_eq!(!ols.is_empty(), expect_ols_fields);
        assert!(ols.get("rag").is_none());
    }

    #[test]
    fn crd_is_cluster_scoped() {
        let crd = OLSConfig::crd();

        assert_eq!(crd.spec.group, crate::GROUP);
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.names.kind, "OLSConfig");
        assert_eq!(crd.spec.names.plural, "olsconfigs");
        assert_eq!(crd.metadata.name.as_deref(), Some("olsconfigs.ols.openshift.io"));
    }

    #[test]
    fn crd_lists_only_modeled_provider_types() {
        let crd = serde_json::to_value(OLSConfig::crd()).expect("CRD must serialize");
        let provider_types = crd
            .pointer(
                "/spec/versions/0/schema/openAPIV3Schema/properties/spec/properties/llm/properties\
                 /providers/items/properties/type/enum",
            )
            .and_then(serde_json::Value::as_array)
            .expect("provider type must be an enum");

        assert!(provider_types.contains(&serde_json::json!("openai")));
        assert!(!provider_types.contains(&serde_json::json!("Unknown")));
    }
}
