//! Wires the [`OLSConfigCustomDefaulter`] into the admission webhook server.
use std::sync::Arc;

use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use kube::Resource;
use lightspeed_webhook::webhooks::{
    FailurePolicy, MutatingWebhook, MutatingWebhookBuilder, SideEffects, WebhookConfiguration,
    mutating_http_path,
};

use crate::{
    config::DefaultingConfig,
    crd::OLSConfig,
    defaulting::{Environment, OLSConfigCustomDefaulter},
};

/// The name of the `MutatingWebhookConfiguration` registering the webhook.
pub const MUTATING_WEBHOOK_CONFIGURATION_NAME: &str =
    "openstack-lightspeed-operator-mutating-webhook-configuration";

/// The name of the webhook defaulting [`OLSConfig`]s.
pub const OLSCONFIG_WEBHOOK_NAME: &str = "molsconfig-v1alpha1.kb.io";

/// Creates the mutating webhook defaulting [`OLSConfig`]s, served under
/// `/mutate-ols-openshift-io-v1alpha1-olsconfig`.
pub fn olsconfig_webhook<E>(
    config: Arc<DefaultingConfig>,
    environment: E,
) -> MutatingWebhook<OLSConfig, OLSConfigCustomDefaulter<E>>
where
    E: Environment,
{
    MutatingWebhook::new(OLSConfigCustomDefaulter::with_environment(
        config,
        environment,
    ))
}

/// Creates the `MutatingWebhookConfiguration` pointing the API server at the operator Service.
///
/// Creates and updates of [`OLSConfig`]s are intercepted. Calls fail closed and have no side
/// effects. The CA bundle is left empty, it is injected by the certificate provider.
pub fn mutating_webhook_configuration(
    operator_service_name: &str,
    operator_namespace: &str,
    webhook_port: u16,
) -> MutatingWebhookConfiguration {
    let webhook = MutatingWebhookBuilder::new(
        OLSCONFIG_WEBHOOK_NAME,
        operator_service_name,
        operator_namespace,
        webhook_port,
        mutating_http_path::<OLSConfig>(),
    )
    .side_effects(SideEffects::None)
    .failure_policy(FailurePolicy::Fail)
    .add_rule(
        &["CREATE", "UPDATE"],
        OLSConfig::group(&()),
        OLSConfig::version(&()),
        OLSConfig::plural(&()),
    )
    .build();

    WebhookConfiguration::mutating(MUTATING_WEBHOOK_CONFIGURATION_NAME)
        .add_webhook(webhook)
        .build()
}
