//! Command line interface of the operator.
//!
//! Every argument can also be provided as an environment variable, for example
//! `--webhook-port` as `WEBHOOK_PORT`.
use std::{net::IpAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser};
use lightspeed_telemetry::TelemetryOptions;
use lightspeed_webhook::{
    WebhookOptions,
    constants::{
        DEFAULT_CERT_DIR, DEFAULT_CERT_NAME, DEFAULT_HTTPS_PORT, DEFAULT_KEY_NAME,
        DEFAULT_LISTEN_ADDRESS,
    },
};

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(
    name = "openstack-lightspeed-operator",
    author,
    version,
    about = "Defaults OLSConfig resources for OpenStack Lightspeed"
)]
pub struct Opts {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Parser)]
pub enum Command {
    /// Print CRD objects.
    Crd,

    /// Print the MutatingWebhookConfiguration registering the webhook.
    WebhookConfig(WebhookConfigArguments),

    /// Run the webhook server.
    Run(RunArguments),
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct WebhookConfigArguments {
    /// The namespace the operator is running in.
    #[arg(long, env)]
    pub operator_namespace: String,

    /// The name of the Service the webhook server is reachable at.
    #[arg(long, env)]
    pub operator_service_name: String,

    /// The port of the Service the webhook server is reachable at.
    #[arg(long, env, default_value_t = DEFAULT_HTTPS_PORT)]
    pub webhook_port: u16,
}

#[derive(Debug, PartialEq, Eq, Args)]
#[command(long_about = "")]
pub struct RunArguments {
    /// The IP address the webhook server binds to.
    #[arg(long, env, default_value_t = DEFAULT_LISTEN_ADDRESS)]
    pub webhook_bind_address: IpAddr,

    /// The port the webhook server binds to.
    #[arg(long, env, default_value_t = DEFAULT_HTTPS_PORT)]
    pub webhook_port: u16,

    /// The DIRECTORY containing the serving certificate and private key.
    #[arg(long, env, value_name = "DIRECTORY", default_value = DEFAULT_CERT_DIR)]
    pub cert_dir: PathBuf,

    /// The file name of the PEM encoded certificate (chain).
    #[arg(long, env, default_value = DEFAULT_CERT_NAME)]
    pub cert_name: String,

    /// The file name of the PEM encoded private key.
    #[arg(long, env, default_value = DEFAULT_KEY_NAME)]
    pub key_name: String,

    /// How often the certificate and private key are read again, for example `30s` or `5m`.
    #[arg(long, env, value_name = "DURATION", default_value = "1m", value_parser = humantime::parse_duration)]
    pub certificate_reload_interval: Duration,

    /// How long open connections may take to finish their requests on shutdown.
    #[arg(long, env, value_name = "DURATION", default_value = "10s", value_parser = humantime::parse_duration)]
    pub shutdown_timeout: Duration,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

impl RunArguments {
    pub fn webhook_options(&self) -> WebhookOptions {
        WebhookOptions::builder()
            .bind_address(self.webhook_bind_address, self.webhook_port)
            .cert_dir(&self.cert_dir)
            .cert_name(&self.cert_name)
            .key_name(&self.key_name)
            .certificate_reload_interval(self.certificate_reload_interval)
            .shutdown_timeout(self.shutdown_timeout)
            .build()
    }
}
