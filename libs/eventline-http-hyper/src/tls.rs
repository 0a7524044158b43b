//! HTTPS connector for the hyper client.

use crate::config::TlsRootConfig;
use eventline_http::{HttpError, TransportSecurity};
use hyper_rustls::{ConfigBuilderExt as _, HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::crypto::{CryptoProvider, aws_lc_rs};
use std::sync::Arc;

fn rustls_error(e: rustls::Error) -> HttpError {
    HttpError::Tls(Box::new(e))
}

/// Client config trusting whatever the OS store yields.
///
/// Unreadable entries are skipped; a store with no usable root at all is an
/// error, so factory construction fails instead of every handshake.
fn os_trust(provider: Arc<CryptoProvider>) -> Result<rustls::ClientConfig, HttpError> {
    let loaded = rustls_native_certs::load_native_certs();
    let mut roots = rustls::RootCertStore::empty();
    let (added, skipped) = roots.add_parsable_certificates(loaded.certs);
    if !loaded.errors.is_empty() || skipped > 0 {
        tracing::warn!(
            added,
            skipped,
            load_errors = loaded.errors.len(),
            "OS trust store is partially unusable"
        );
    }
    if roots.is_empty() {
        return Err(HttpError::Tls(
            "OS trust store holds no usable root certificate".into(),
        ));
    }
    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(rustls_error)?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

/// Connector for the configured trust roots.
///
/// Plain `http` targets are only dialled when `security` allows them;
/// otherwise the connector refuses them before any byte is sent.
///
/// # Errors
///
/// Returns [`HttpError::Tls`] when the trust roots cannot be set up.
pub(crate) fn https_connector(
    roots: TlsRootConfig,
    security: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let tls = match roots {
        TlsRootConfig::WebPki => rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(rustls_error)?
            .with_webpki_roots()
            .with_no_client_auth(),
        TlsRootConfig::Native => os_trust(provider)?,
    };

    let builder = HttpsConnectorBuilder::new().with_tls_config(tls);
    let builder = if security == TransportSecurity::AllowInsecureHttp {
        builder.https_or_http()
    } else {
        builder.https_only()
    };
    Ok(builder.enable_all_versions().build())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_webpki_connector_builds_for_both_modes() {
        assert!(https_connector(TlsRootConfig::WebPki, TransportSecurity::TlsOnly).is_ok());
        assert!(
            https_connector(TlsRootConfig::WebPki, TransportSecurity::AllowInsecureHttp).is_ok()
        );
    }

    #[test]
    fn test_native_roots_fail_only_with_tls_error() {
        // Minimal containers may ship without an OS trust store.
        if let Err(e) = https_connector(TlsRootConfig::Native, TransportSecurity::TlsOnly) {
            assert!(matches!(e, HttpError::Tls(_)));
        }
    }
}
