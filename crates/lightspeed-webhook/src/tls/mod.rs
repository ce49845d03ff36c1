//! This module contains structs and functions to easily create a TLS termination
//! server, which can be used in combination with an Axum [`Router`].
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, extract::Request};
use futures_util::pin_mut;
use hyper::{body::Incoming, service::service_fn};
use hyper_util::rt::{TokioExecutor, TokioIo};
use snafu::{ResultExt, Snafu};
use tokio::{
    net::TcpListener,
    sync::watch,
    task::JoinSet,
    time::{interval, timeout},
};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        ServerConfig,
        crypto::ring::default_provider,
        version::{TLS12, TLS13},
    },
};
use tower::{Service, ServiceExt};
use tracing::{Instrument, instrument};

pub use crate::tls::cert_resolver::{CertificateResolver, CertificateResolverError};
use crate::options::WebhookOptions;

mod cert_resolver;

pub type Result<T, E = TlsServerError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum TlsServerError {
    #[snafu(display("failed to create certificate resolver"))]
    CreateCertificateResolver { source: CertificateResolverError },

    #[snafu(display("failed to create TCP listener by binding to socket address {socket_addr:?}"))]
    BindTcpListener {
        source: std::io::Error,
        socket_addr: SocketAddr,
    },

    #[snafu(display("failed to set safe TLS protocol versions"))]
    SetSafeTlsProtocolVersions { source: tokio_rustls::rustls::Error },
}

/// A server which terminates TLS connections and allows clients to communicate
/// via HTTPS with the underlying HTTP router.
pub struct TlsServer {
    config: ServerConfig,
    cert_resolver: Arc<CertificateResolver>,
    certificate_reload_interval: Duration,
    shutdown_timeout: Duration,

    socket_addr: SocketAddr,
    router: Router,
}

impl TlsServer {
    #[instrument(name = "create_tls_server", skip(router))]
    pub async fn new(router: Router, options: &WebhookOptions) -> Result<Self> {
        let cert_resolver = Arc::new(
            CertificateResolver::new(options.certificate_path(), options.private_key_path())
                .await
                .context(CreateCertificateResolverSnafu)?,
        );

        let tls_provider = default_provider();
        let mut config = ServerConfig::builder_with_provider(tls_provider.into())
            .with_protocol_versions(&[&TLS12, &TLS13])
            .context(SetSafeTlsProtocolVersionsSnafu)?
            .with_no_client_auth()
            .with_cert_resolver(cert_resolver.clone());
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(Self {
            config,
            cert_resolver,
            certificate_reload_interval: options.certificate_reload_interval,
            shutdown_timeout: options.shutdown_timeout,
            socket_addr: options.socket_addr,
            router,
        })
    }

    /// Runs the TLS server by listening for incoming TCP connections on the
    /// bound socket address. It only accepts TLS connections. Internally each
    /// TLS stream get handled by a Hyper service, which in turn is an Axum
    /// router.
    ///
    /// Once `shutdown` completes, no new connections are accepted and open connections are asked
    /// to finish their in-flight requests. Connections still open after the shutdown timeout are
    /// closed forcefully.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let reload_task = tokio::spawn(Self::run_certificate_reload_loop(
            self.cert_resolver,
            self.certificate_reload_interval,
        ));

        let tls_acceptor = TlsAcceptor::from(Arc::new(self.config));
        let tcp_listener =
            TcpListener::bind(self.socket_addr)
                .await
                .context(BindTcpListenerSnafu {
                    socket_addr: self.socket_addr,
                })?;

        tracing::info!(socket_addr = %self.socket_addr, "webhook server listening");

        // To be able to extract the connect info from incoming requests, it is
        // required to turn the router into a Tower service which is capable of
        // doing that. Calling `into_make_service_with_connect_info` returns a
        // new struct `IntoMakeServiceWithConnectInfo` which implements the
        // Tower Service trait. This service is called after the TCP connection
        // has been accepted.
        let mut router = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        // Dropping the sender tells every connection to drain.
        let (drain_tx, drain_rx) = watch::channel(());
        let mut connections = JoinSet::new();

        pin_mut!(shutdown);
        loop {
            let tls_acceptor = tls_acceptor.clone();

            // Wait for new tcp connection or the shutdown, reaping finished connections meanwhile
            let (tcp_stream, remote_addr) = tokio::select! {
                () = &mut shutdown => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                accepted = tcp_listener.accept() => match accepted {
                    Ok((stream, addr)) => (stream, addr),
                    Err(err) => {
                        tracing::trace!(%err, "failed to accept incoming TCP connection");
                        continue;
                    }
                },
            };

            // Here, the connect info is extracted by calling Tower's Service
            // trait function on `IntoMakeServiceWithConnectInfo`
            let Ok(tower_service) = router.call(remote_addr).await;

            let span = tracing::debug_span!(
                "accept tcp connection",
                client.address = %remote_addr.ip(),
                client.port = remote_addr.port(),
            );
            let mut drain_rx = drain_rx.clone();
            connections.spawn(
                async move {
                    // Wait for tls handshake to happen
                    let tls_stream = tokio::select! {
                        accepted = tls_acceptor.accept(tcp_stream) => match accepted {
                            Ok(tls_stream) => tls_stream,
                            Err(err) => {
                                tracing::trace!(%err, %remote_addr, "error during tls handshake connection");
                                return;
                            }
                        },
                        _ = drain_rx.changed() => return,
                    };

                    // Hyper has its own `AsyncRead` and `AsyncWrite` traits and doesn't use tokio.
                    // `TokioIo` converts between them.
                    let tls_stream = TokioIo::new(tls_stream);

                    // Hyper also has its own `Service` trait and doesn't use tower. We can use
                    // `hyper::service::service_fn` to create a hyper `Service` that calls our app through
                    // `tower::Service::call`.
                    let hyper_service = service_fn(move |request: Request<Incoming>| {
                        // We need to clone here, because oneshot consumes self
                        tower_service.clone().oneshot(request)
                    });

                    let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
                    let connection = builder.serve_connection_with_upgrades(tls_stream, hyper_service);
                    pin_mut!(connection);

                    let result = tokio::select! {
                        result = connection.as_mut() => result,
                        _ = drain_rx.changed() => {
                            tracing::trace!(%remote_addr, "draining connection");
                            connection.as_mut().graceful_shutdown();
                            connection.await
                        }
                    };

                    if let Err(err) = result {
                        tracing::warn!(%err, %remote_addr, "failed to serve connection");
                    }
                }
                .instrument(span),
            );
        }

        tracing::info!(
            connections = connections.len(),
            "stopped accepting connections, draining open connections"
        );
        drop(drain_tx);

        let drained = timeout(self.shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                connections = connections.len(),
                timeout = ?self.shutdown_timeout,
                "connections did not drain in time, closing them"
            );
            connections.shutdown().await;
        }

        reload_task.abort();
        tracing::info!("webhook server stopped");

        Ok(())
    }

    /// Periodically reads the mounted certificate again. Failed reloads are logged and the
    /// previous certificate keeps being served.
    async fn run_certificate_reload_loop(
        cert_resolver: Arc<CertificateResolver>,
        reload_interval: Duration,
    ) {
        let mut interval = interval(reload_interval);
        // The first tick completes immediately, the certificate was just loaded.
        interval.tick().await;

        loop {
            interval.tick().await;

            if let Err(err) = cert_resolver.reload_certificate().await {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    "failed to reload certificate, keep serving the previous one"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{net::TcpStream, sync::oneshot};

    use super::*;

    const TLS_CERTIFICATE: &str = include_str!("../../fixtures/tls.crt");
    const TLS_PRIVATE_KEY: &str = include_str!("../../fixtures/tls.key");

    async fn tls_server(dir: &std::path::Path, socket_addr: SocketAddr) -> TlsServer {
        tokio::fs::write(dir.join("tls.crt"), TLS_CERTIFICATE)
            .await
            .expect("failed to write certificate");
        tokio::fs::write(dir.join("tls.key"), TLS_PRIVATE_KEY)
            .await
            .expect("failed to write private key");

        let options = WebhookOptions::builder()
            .bind_address(socket_addr.ip(), socket_addr.port())
            .cert_dir(dir)
            .shutdown_timeout(Duration::from_millis(200))
            .build();

        TlsServer::new(Router::new(), &options)
            .await
            .expect("failed to create TLS server")
    }

    /// Returns a currently unused local socket address.
    fn free_socket_addr() -> SocketAddr {
        std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .expect("failed to find a free port")
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let dir = tempfile::tempdir().expect("failed to create temporary directory");
        let server = tls_server(dir.path(), free_socket_addr()).await;

        let result = tokio::time::timeout(Duration::from_secs(5), server.run(std::future::ready(())))
            .await
            .expect("server must stop once shut down");

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn stalled_connection_does_not_block_shutdown() {
        let dir = tempfile::tempdir().expect("failed to create temporary directory");
        let socket_addr = free_socket_addr();
        let server = tls_server(dir.path(), socket_addr).await;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server.run(async {
            let _ = shutdown_rx.await;
        }));

        // The client never starts the TLS handshake.
        let _client = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(stream) = TcpStream::connect(socket_addr).await {
                    break stream;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server must accept connections");

        shutdown_tx.send(()).expect("server must still be running");

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server must stop once shut down")
            .expect("server task must not panic");

        assert!(result.is_ok());
    }
}
