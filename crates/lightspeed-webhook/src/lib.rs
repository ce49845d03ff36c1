//! Utility types and functions to easily create ready-to-use admission webhook
//! servers. All webhook servers use HTTPS, the serving certificate is read from
//! disk and reloaded periodically. This library is fully compatible with the
//! [`tracing`] crate and emits debug level tracing data.
//!
//! Most users construct one or more [`MutatingWebhook`][1]s wrapping a
//! [`CustomDefaulter`] and hand them to the [`WebhookServer`].
//!
//! ```no_run
//! use lightspeed_webhook::{WebhookOptions, WebhookServer};
//!
//! # async fn docs() {
//! let server = WebhookServer::new(vec![], WebhookOptions::default())
//!     .await
//!     .expect("failed to create webhook server");
//! # }
//! ```
//!
//! [1]: crate::webhooks::MutatingWebhook
use axum::{Router, routing::get};
use snafu::{ResultExt, Snafu};
use tokio::signal::unix::{SignalKind, signal};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{tls::TlsServer, webhooks::Webhook};

pub mod constants;
pub mod defaulter;
pub mod options;
pub mod tls;
pub mod webhooks;

// Selected re-exports
pub use crate::{
    defaulter::{AdmissionObject, CustomDefaulter, DefaultingContext},
    options::WebhookOptions,
};

/// A result type alias with the [`WebhookServerError`] type as the default error type.
pub type Result<T, E = WebhookServerError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum WebhookServerError {
    #[snafu(display("failed to create TLS server"))]
    CreateTlsServer { source: tls::TlsServerError },

    #[snafu(display("failed to run TLS server"))]
    RunTlsServer { source: tls::TlsServerError },

    #[snafu(display("failed to create {signal} signal listener"))]
    CreateSignalListener {
        source: std::io::Error,
        signal: &'static str,
    },
}

/// A ready-to-use webhook server.
///
/// This server abstracts away lower-level details like TLS termination
/// and other various configurations, validations or middlewares. The routes
/// and their handlers are contributed by the passed [`Webhook`]s.
pub struct WebhookServer {
    tls_server: TlsServer,
}

impl WebhookServer {
    /// Creates a new ready-to-use webhook server.
    ///
    /// The server listens on `socket_addr` which is provided via the [`WebhookOptions`]
    /// and handles routing based on the routes registered by `webhooks`. Most of the
    /// time it is sufficient to use [`WebhookOptions::default()`].
    ///
    /// To start the server, use the [`WebhookServer::run()`] function. This will
    /// run the server using the Tokio runtime until it is terminated.
    pub async fn new(webhooks: Vec<Box<dyn Webhook>>, options: WebhookOptions) -> Result<Self> {
        tracing::trace!("create new webhook server");

        let router = Self::router(&webhooks);

        tracing::debug!("create TLS server");
        let tls_server = TlsServer::new(router, &options)
            .await
            .context(CreateTlsServerSnafu)?;

        Ok(Self { tls_server })
    }

    /// Creates the root router containing the routes of all `webhooks`.
    fn router(webhooks: &[Box<dyn Webhook>]) -> Router {
        let mut router = Router::new();
        for webhook in webhooks {
            router = webhook.register_routes(router);
        }

        // Use a service builder to provide multiple layers at once. Recommended
        // by the Axum project.
        //
        // See https://docs.rs/axum/latest/axum/middleware/index.html#applying-multiple-middleware
        let service_builder = ServiceBuilder::new().layer(TraceLayer::new_for_http());

        tracing::debug!("create core router and merge webhook routes");
        router
            .layer(service_builder)
            // The health route is below the TraceLayer so as not to be traced
            .route("/health", get(|| async { "ok" }))
    }

    /// Runs the Webhook server until SIGINT or SIGTERM is received.
    ///
    /// On shutdown the server stops accepting connections and lets open connections finish their
    /// in-flight requests, bounded by [`WebhookOptions::shutdown_timeout`].
    pub async fn run(self) -> Result<()> {
        let shutdown = shutdown_signal()?;

        tracing::debug!("run webhook server");
        self.tls_server
            .run(shutdown)
            .await
            .context(RunTlsServerSnafu)
    }
}

/// Creates the SIGINT and SIGTERM listeners and returns a future completing once either signal
/// was received.
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigint = signal(SignalKind::interrupt())
        .context(CreateSignalListenerSnafu { signal: "SIGINT" })?;
    let mut sigterm = signal(SignalKind::terminate())
        .context(CreateSignalListenerSnafu { signal: "SIGTERM" })?;

    tracing::debug!("created unix signal handlers");

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    })
}
