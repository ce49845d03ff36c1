//! Contains available options to configure the [WebhookServer][crate::WebhookServer].
use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::constants::{
    DEFAULT_CERT_DIR, DEFAULT_CERT_NAME, DEFAULT_CERTIFICATE_RELOAD_INTERVAL, DEFAULT_KEY_NAME,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_SOCKET_ADDRESS,
};

/// Specifies available webhook server options.
///
/// The [`Default`] implementation for this struct contains the following values:
///
/// - The socket binds to 0.0.0.0 on port 9443 (HTTPS)
/// - The certificate and private key are read from `/tmp/k8s-webhook-server/serving-certs`, using
///   the file names `tls.crt` and `tls.key`
/// - Both files are read again every minute
/// - Open connections get 10 seconds to finish their requests on shutdown
///
/// ### Example with Custom HTTPS IP Address and Port
///
/// ```
/// use lightspeed_webhook::WebhookOptions;
///
/// // Set IP address and port at the same time
/// let options = WebhookOptions::builder()
///     .bind_address([0, 0, 0, 0], 12345)
///     .build();
///
/// // Set IP address only
/// let options = WebhookOptions::builder()
///     .bind_ip([127, 0, 0, 1])
///     .build();
///
/// // Set port only
/// let options = WebhookOptions::builder()
///     .bind_port(12345)
///     .build();
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct WebhookOptions {
    /// The HTTPS socket address the [`TcpListener`][tokio::net::TcpListener] binds to.
    pub socket_addr: SocketAddr,

    /// The directory containing the serving certificate and private key.
    pub cert_dir: PathBuf,

    /// The file name of the PEM encoded certificate (chain) within [`Self::cert_dir`].
    pub cert_name: String,

    /// The file name of the PEM encoded private key within [`Self::cert_dir`].
    pub key_name: String,

    /// The interval in which the certificate and private key are read from disk again.
    pub certificate_reload_interval: Duration,

    /// How long open connections may take to drain when the server shuts down.
    pub shutdown_timeout: Duration,
}

impl Default for WebhookOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WebhookOptions {
    /// Returns the default [`WebhookOptionsBuilder`] which allows to selectively
    /// customize the options. See the documentation for [`WebhookOptions`] for more
    /// information on available functions.
    pub fn builder() -> WebhookOptionsBuilder {
        WebhookOptionsBuilder::default()
    }

    /// The full path of the PEM encoded certificate.
    pub fn certificate_path(&self) -> PathBuf {
        self.cert_dir.join(&self.cert_name)
    }

    /// The full path of the PEM encoded private key.
    pub fn private_key_path(&self) -> PathBuf {
        self.cert_dir.join(&self.key_name)
    }
}

/// The [`WebhookOptionsBuilder`] which allows to selectively customize the webhook
/// server [`WebhookOptions`].
///
/// Usually, this struct is not constructed manually, but instead by calling
/// [`WebhookOptions::builder()`] or [`WebhookOptionsBuilder::default()`].
#[derive(Debug, Default)]
pub struct WebhookOptionsBuilder {
    socket_addr: Option<SocketAddr>,
    cert_dir: Option<PathBuf>,
    cert_name: Option<String>,
    key_name: Option<String>,
    certificate_reload_interval: Option<Duration>,
    shutdown_timeout: Option<Duration>,
}

impl WebhookOptionsBuilder {
    /// Sets the socket address the webhook server uses to bind for HTTPS.
    pub fn bind_address(mut self, bind_ip: impl Into<IpAddr>, bind_port: u16) -> Self {
        self.socket_addr = Some(SocketAddr::new(bind_ip.into(), bind_port));
        self
    }

    /// Sets the IP address of the socket address the webhook server uses to
    /// bind for HTTPS.
    pub fn bind_ip(mut self, bind_ip: impl Into<IpAddr>) -> Self {
        let addr = self.socket_addr.get_or_insert(DEFAULT_SOCKET_ADDRESS);
        addr.set_ip(bind_ip.into());
        self
    }

    /// Sets the port of the socket address the webhook server uses to bind
    /// for HTTPS.
    pub fn bind_port(mut self, bind_port: u16) -> Self {
        let addr = self.socket_addr.get_or_insert(DEFAULT_SOCKET_ADDRESS);
        addr.set_port(bind_port);
        self
    }

    /// Sets the directory containing the serving certificate and private key.
    pub fn cert_dir(mut self, cert_dir: impl AsRef<Path>) -> Self {
        self.cert_dir = Some(cert_dir.as_ref().to_path_buf());
        self
    }

    /// Sets the file name of the certificate within the certificate directory.
    pub fn cert_name(mut self, cert_name: impl Into<String>) -> Self {
        self.cert_name = Some(cert_name.into());
        self
    }

    /// Sets the file name of the private key within the certificate directory.
    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Sets how often the certificate and private key are read from disk again.
    pub fn certificate_reload_interval(mut self, interval: Duration) -> Self {
        self.certificate_reload_interval = Some(interval);
        self
    }

    /// Sets how long open connections may take to drain when the server shuts down.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Builds the final [`WebhookOptions`] by using default values for any not
    /// explicitly set option.
    pub fn build(self) -> WebhookOptions {
        WebhookOptions {
            socket_addr: self.socket_addr.unwrap_or(DEFAULT_SOCKET_ADDRESS),
            cert_dir: self
                .cert_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_DIR)),
            cert_name: self
                .cert_name
                .unwrap_or_else(|| DEFAULT_CERT_NAME.to_owned()),
            key_name: self.key_name.unwrap_or_else(|| DEFAULT_KEY_NAME.to_owned()),
            certificate_reload_interval: self
                .certificate_reload_interval
                .unwrap_or(DEFAULT_CERTIFICATE_RELOAD_INTERVAL),
            shutdown_timeout: self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
        }
    }
}
