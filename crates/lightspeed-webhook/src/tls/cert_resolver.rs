use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use arc_swap::ArcSwap;
use snafu::{ResultExt, Snafu};
use tokio_rustls::rustls::{
    crypto::ring::default_provider,
    pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject},
    server::{ClientHello, ResolvesServerCert},
    sign::CertifiedKey,
};

type Result<T, E = CertificateResolverError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum CertificateResolverError {
    #[snafu(display("failed to read certificate file {path:?}"))]
    ReadCertificateFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read private key file {path:?}"))]
    ReadPrivateKeyFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to decode PEM encoded certificates from {path:?}"))]
    DecodeCertificatePem {
        source: tokio_rustls::rustls::pki_types::pem::Error,
        path: PathBuf,
    },

    #[snafu(display("the certificate file {path:?} contains no certificates"))]
    EmptyCertificateChain { path: PathBuf },

    #[snafu(display("failed to decode PEM encoded private key from {path:?}"))]
    DecodePrivateKeyPem {
        source: tokio_rustls::rustls::pki_types::pem::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to create CertifiedKey from certificate chain and private key"))]
    CreateCertifiedKey { source: tokio_rustls::rustls::Error },
}

/// This struct serves as [`ResolvesServerCert`] to always hand out the current certificate for TLS
/// client connections.
///
/// The certificate (chain) and private key are mounted into the container, usually by
/// cert-manager or the service CA. They are rotated externally, so [`Self::reload_certificate`]
/// reads both files again and hot-swaps the certificate in the running webhook.
#[derive(Debug)]
pub struct CertificateResolver {
    /// Using a [`ArcSwap`] (over e.g. [`tokio::sync::RwLock`]), so that we can easily
    /// (and performant) bridge between async write and sync read.
    current_certified_key: ArcSwap<CertifiedKey>,

    certificate_path: PathBuf,
    private_key_path: PathBuf,
}

impl CertificateResolver {
    pub async fn new(
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let certificate_path = certificate_path.into();
        let private_key_path = private_key_path.into();

        let certified_key = Self::load_certified_key(&certificate_path, &private_key_path).await?;

        Ok(Self {
            current_certified_key: ArcSwap::new(certified_key),
            certificate_path,
            private_key_path,
        })
    }

    /// Reads the certificate and private key from disk and replaces the currently served
    /// certificate. On error the previous certificate stays in place.
    pub async fn reload_certificate(&self) -> Result<()> {
        let certified_key =
            Self::load_certified_key(&self.certificate_path, &self.private_key_path).await?;

        if certified_key.cert == self.current_certified_key.load().cert {
            tracing::trace!("certificate is unchanged");
            return Ok(());
        }

        tracing::info!(
            certificate.path = %self.certificate_path.display(),
            "serving rotated certificate"
        );
        self.current_certified_key.store(certified_key);

        Ok(())
    }

    async fn load_certified_key(
        certificate_path: &Path,
        private_key_path: &Path,
    ) -> Result<Arc<CertifiedKey>> {
        let certificate_pem = tokio::fs::read(certificate_path)
            .await
            .context(ReadCertificateFileSnafu {
                path: certificate_path,
            })?;
        let private_key_pem =
            tokio::fs::read(private_key_path)
                .await
                .context(ReadPrivateKeyFileSnafu {
                    path: private_key_path,
                })?;

        let certificate_chain = CertificateDer::pem_slice_iter(&certificate_pem)
            .collect::<Result<Vec<_>, _>>()
            .context(DecodeCertificatePemSnafu {
                path: certificate_path,
            })?;
        snafu::ensure!(
            !certificate_chain.is_empty(),
            EmptyCertificateChainSnafu {
                path: certificate_path
            }
        );

        let private_key =
            PrivateKeyDer::from_pem_slice(&private_key_pem).context(DecodePrivateKeyPemSnafu {
                path: private_key_path,
            })?;

        let certified_key =
            CertifiedKey::from_der(certificate_chain, private_key, &default_provider())
                .context(CreateCertifiedKeySnafu)?;

        Ok(Arc::new(certified_key))
    }
}

impl ResolvesServerCert for CertificateResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.current_certified_key.load_full())
    }
}
