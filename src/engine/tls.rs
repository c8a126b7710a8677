use std::sync::Arc;

use chrono::Utc;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, aws_lc_rs, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use x509_parser::parse_x509_certificate;

/// Days until the peer's leaf certificate expires (negative once expired).
pub async fn cert_validity_days(host: &str, port: u16, connector: &TokioTlsConnector) -> Option<i64> {
    let stream = tokio::net::TcpStream::connect((host, port)).await.ok()?;

    let tls_stream = connector.connect(host, stream).await.ok()?;

    // Extract certificate in blocking context
    let cert_der = tokio::task::spawn_blocking(move || {
        let cert = tls_stream.get_ref().peer_certificate().ok().flatten()?;
        cert.to_der().ok()
    })
    .await
    .ok()??;

    let (_, parsed) = parse_x509_certificate(&cert_der).ok()?;

    let not_after = parsed.validity().not_after.timestamp();
    Some((not_after - Utc::now().timestamp()) / 86400)
}

/// Key exchange groups offered by the quantum probe, hybrid post-quantum first.
fn offered_kx_groups() -> Vec<&'static dyn rustls::crypto::SupportedKxGroup> {
    vec![
        aws_lc_rs::kx_group::X25519MLKEM768,
        aws_lc_rs::kx_group::X25519,
        aws_lc_rs::kx_group::SECP256R1,
        aws_lc_rs::kx_group::SECP384R1,
    ]
}

/// Whether a negotiated group name denotes a post-quantum (hybrid) key exchange.
pub fn is_post_quantum_group(name: &str) -> bool {
    let name = name.to_ascii_uppercase();
    name.contains("MLKEM") || name.contains("KYBER")
}

/// Client configuration for inspecting key exchange only. Certificates are
/// not validated: the probe reports on the handshake, not on trust.
pub fn post_quantum_client_config() -> Result<ClientConfig, rustls::Error> {
    let mut provider = aws_lc_rs::default_provider();
    provider.kx_groups = offered_kx_groups();
    let provider = Arc::new(provider);

    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth();
    Ok(config)
}

#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
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
