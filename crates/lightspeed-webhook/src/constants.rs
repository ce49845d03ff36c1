//! Contains various constant definitions, mostly for default ports, IP
//! addresses and certificate locations.
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

/// The default HTTPS port `9443`
pub const DEFAULT_HTTPS_PORT: u16 = 9443;

/// The default IP address [`Ipv4Addr::UNSPECIFIED`] (`0.0.0.0`) the webhook server binds to,
/// which represents binding on all network addresses.
pub const DEFAULT_LISTEN_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// The default socket address `0.0.0.0:9443` the webhook server binds to.
pub const DEFAULT_SOCKET_ADDRESS: SocketAddr =
    SocketAddr::new(DEFAULT_LISTEN_ADDRESS, DEFAULT_HTTPS_PORT);

/// The directory the serving certificate and private key are mounted into.
pub const DEFAULT_CERT_DIR: &str = "/tmp/k8s-webhook-server/serving-certs";

/// The file name of the PEM encoded serving certificate (chain).
pub const DEFAULT_CERT_NAME: &str = "tls.crt";

/// The file name of the PEM encoded private key.
pub const DEFAULT_KEY_NAME: &str = "tls.key";

/// How often the mounted certificate and private key are read again.
pub const DEFAULT_CERTIFICATE_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// How long open connections may take to finish their in-flight requests once the server shuts
/// down. Connections still open afterwards are closed forcefully.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
