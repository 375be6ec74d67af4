//! TLS connector selection.
//!
//! Hostname targets are verified against the webpki root set.  A `wss`
//! URL whose host is a literal IP address skips certificate verification
//! (the upstream IP endpoint serves a certificate issued for its hostname).
//! Plain `ws` never uses TLS.

use std::net::IpAddr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::Connector;

use crate::types::SdkError;

/// `true` when `url` is `wss://<ip literal>...`.
pub fn is_wss_with_ip(url: &str) -> bool {
    let Ok(uri) = url.parse::<Uri>() else {
        return false;
    };
    if uri.scheme_str() != Some("wss") {
        return false;
    }
    uri.host()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .is_some_and(|h| h.parse::<IpAddr>().is_ok())
}

/// Connector for `url`, or `None` for plain `ws://`.
pub fn connector_for(url: &str) -> Result<Option<Connector>, SdkError> {
    if !url.starts_with("wss://") {
        return Ok(None);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| SdkError::WebSocket(format!("tls setup: {e}")))?;

    let config = if is_wss_with_ip(url) {
        tracing::debug!(url, "ip endpoint, certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(Some(Connector::Rustls(Arc::new(config))))
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ip_hosts() {
        assert!(is_wss_with_ip("wss://116.63.174.231/openclaw/v1/ws/link"));
        assert!(is_wss_with_ip("wss://10.0.0.1:8443/x"));
        assert!(is_wss_with_ip("wss://[::1]:443/x"));
        assert!(!is_wss_with_ip("wss://hag.cloud.huawei.com/openclaw/v1/ws/link"));
        assert!(!is_wss_with_ip("ws://127.0.0.1:9000/"));
        assert!(!is_wss_with_ip("::garbage::"));
    }

    #[test]
    fn plain_ws_has_no_connector() {
        assert!(connector_for("ws://127.0.0.1:1/").unwrap().is_none());
    }

    #[test]
    fn wss_gets_rustls_connector() {
        for url in [
            "wss://116.63.174.231/openclaw/v1/ws/link",
            "wss://hag.cloud.huawei.com/openclaw/v1/ws/link",
        ] {
            assert!(matches!(
                connector_for(url).unwrap(),
                Some(Connector::Rustls(_))
            ));
        }
    }
}
