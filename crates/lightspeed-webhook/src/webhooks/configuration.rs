use std::marker::PhantomData;

use k8s_openapi::{
    ByteString, Resource,
    api::admissionregistration::v1::{
        MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
        WebhookClientConfig,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

/// Declares whether calling a webhook has side effects on other objects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum SideEffects {
    #[default]
    None,
    NoneOnDryRun,
}

/// Declares how the API server handles a webhook which can not be called or returns an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum FailurePolicy {
    #[default]
    Fail,
    Ignore,
}

pub struct WebhookConfiguration;

impl WebhookConfiguration {
    /// Create a mutating webhook configuration
    pub fn mutating(
        name: impl Into<String>,
    ) -> WebhookConfigurationBuilder<MutatingWebhook, MutatingWebhookConfiguration> {
        let config = MutatingWebhookConfiguration {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        };

        WebhookConfigurationBuilder {
            hooks: PhantomData,
            config,
        }
    }
}

pub trait WebhookConfigurationExt<H> {
    fn webhooks_mut(&mut self) -> &mut Vec<H>;
}

impl WebhookConfigurationExt<MutatingWebhook> for MutatingWebhookConfiguration {
    fn webhooks_mut(&mut self) -> &mut Vec<MutatingWebhook> {
        self.webhooks.get_or_insert_with(Vec::new)
    }
}

/// The [`WebhookConfigurationBuilder`] helps to create valid admission webhook
/// configurations.
///
/// See the [Kubernetes documentation][k8s-mut] for the meaning of the individual fields.
///
/// [k8s-mut]: https://kubernetes.io/docs/reference/access-authn-authz/admission-controllers/#mutatingadmissionwebhook
#[derive(Debug, Default)]
pub struct WebhookConfigurationBuilder<H, C>
where
    C: Resource + WebhookConfigurationExt<H>,
{
    hooks: PhantomData<H>,
    config: C,
}

impl<H, C> WebhookConfigurationBuilder<H, C>
where
    C: Resource + WebhookConfigurationExt<H>,
{
    pub fn add_webhook(mut self, webhook: H) -> Self {
        self.config.webhooks_mut().push(webhook);
        self
    }

    pub fn build(self) -> C {
        self.config
    }
}

/// Builds a single [`MutatingWebhook`] entry which is served by an in-cluster [`Service`][svc].
///
/// Only `admission.k8s.io/v1` reviews are understood by the webhook server, so
/// `admissionReviewVersions` is always set to `["v1"]`.
///
/// [svc]: k8s_openapi::api::core::v1::Service
#[derive(Debug)]
pub struct MutatingWebhookBuilder {
    name: String,
    side_effects: SideEffects,
    failure_policy: FailurePolicy,
    rules: Vec<RuleWithOperations>,
    service: ServiceReference,
    ca_bundle: Option<ByteString>,
}

impl MutatingWebhookBuilder {
    /// Starts a webhook `name` served at `http_path` of the Service `service_name` in
    /// `service_namespace`.
    pub fn new(
        name: impl Into<String>,
        service_name: impl Into<String>,
        service_namespace: impl Into<String>,
        service_port: u16,
        http_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            side_effects: SideEffects::default(),
            failure_policy: FailurePolicy::default(),
            rules: Vec::new(),
            service: ServiceReference {
                name: service_name.into(),
                namespace: service_namespace.into(),
                path: Some(http_path.into()),
                port: Some(service_port.into()),
            },
            ca_bundle: None,
        }
    }

    pub fn side_effects(mut self, side_effects: SideEffects) -> Self {
        self.side_effects = side_effects;
        self
    }

    pub fn failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Intercepts `operations` on the `resource` (plural name) of `api_group`/`api_version`.
    pub fn add_rule(
        mut self,
        operations: &[&str],
        api_group: impl Into<String>,
        api_version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        self.rules.push(RuleWithOperations {
            api_groups: Some(vec![api_group.into()]),
            api_versions: Some(vec![api_version.into()]),
            operations: Some(operations.iter().map(|op| (*op).to_owned()).collect()),
            resources: Some(vec![resource.into()]),
            scope: None,
        });
        self
    }

    /// The PEM encoded CA bundle used by the API server to verify the serving certificate.
    ///
    /// Usually this is left empty and injected by cert-manager or the service CA operator.
    pub fn ca_bundle(mut self, ca_bundle: ByteString) -> Self {
        self.ca_bundle = Some(ca_bundle);
        self
    }

    pub fn build(self) -> MutatingWebhook {
        MutatingWebhook {
            name: self.name,
            admission_review_versions: vec!["v1".to_owned()],
            side_effects: self.side_effects.to_string(),
            failure_policy: Some(self.failure_policy.to_string()),
            rules: Some(self.rules),
            client_config: WebhookClientConfig {
                service: Some(self.service),
                // Here, ByteString takes care of encoding the provided content as base64.
                ca_bundle: self.ca_bundle,
                url: None,
            },
            ..Default::default()
        }
    }
}
