use std::sync::Arc;

use clap::Parser;
use lightspeed_shared::{
    crd::CustomResourceExt as _,
    yaml::{SerializeOptions, YamlDocument as _},
};
use lightspeed_webhook::{WebhookServer, WebhookServerError};
use openstack_lightspeed_operator::{
    OPERATOR_NAME,
    cli::{Command, Opts, RunArguments, WebhookConfigArguments},
    config::DefaultingConfig,
    crd::OLSConfig,
    defaulting::ProcessEnvironment,
    webhook::{mutating_webhook_configuration, olsconfig_webhook},
};
use snafu::{ResultExt as _, Snafu};

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to print CRD"))]
    PrintCrd {
        source: lightspeed_shared::crd::Error,
    },

    #[snafu(display("failed to print MutatingWebhookConfiguration"))]
    PrintWebhookConfiguration {
        source: lightspeed_shared::yaml::Error,
    },

    #[snafu(display("failed to initialize tracing"))]
    InitTracing {
        source: lightspeed_telemetry::Error,
    },

    #[snafu(display("failed to create webhook server"))]
    CreateWebhookServer { source: WebhookServerError },

    #[snafu(display("failed to run webhook server"))]
    RunWebhookServer { source: WebhookServerError },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();

    match opts.command {
        Command::Crd => OLSConfig::print_yaml_schema().context(PrintCrdSnafu)?,
        Command::WebhookConfig(WebhookConfigArguments {
            operator_namespace,
            operator_service_name,
            webhook_port,
        }) => mutating_webhook_configuration(
            &operator_service_name,
            &operator_namespace,
            webhook_port,
        )
        .print_yaml_document(SerializeOptions::default())
        .context(PrintWebhookConfigurationSnafu)?,
        Command::Run(args) => run(args).await?,
    }

    Ok(())
}

async fn run(args: RunArguments) -> Result<(), Error> {
    let webhook_options = args.webhook_options();

    // Dropping the guard flushes the non-blocking file log writer.
    let _tracing_guard =
        lightspeed_telemetry::init(OPERATOR_NAME, args.telemetry).context(InitTracingSnafu)?;

    tracing::info!(
        built_info.crate_version = env!("CARGO_PKG_VERSION"),
        "starting {OPERATOR_NAME}"
    );

    let config = Arc::new(DefaultingConfig::default());
    let webhook = olsconfig_webhook(config, ProcessEnvironment);

    let server = WebhookServer::new(vec![Box::new(webhook)], webhook_options)
        .await
        .context(CreateWebhookServerSnafu)?;

    server.run().await.context(RunWebhookServerSnafu)
}
