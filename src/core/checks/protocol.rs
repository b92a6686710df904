// src/core/checks/protocol.rs

use crate::core::models::CheckResult;
use color_eyre::eyre::Result;
use native_tls::Protocol;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, ProtocolVersion, ServerName};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::TcpStream;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

/// Negotiated protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersionKind {
    Tls13,
    Tls12,
    Unknown,
}

impl TlsVersionKind {
    fn label(&self) -> &'static str {
        match self {
            TlsVersionKind::Tls13 => "TLS 1.3",
            TlsVersionKind::Tls12 => "TLS 1.2",
            TlsVersionKind::Unknown => "unknown",
        }
    }
}

/// What the protocol probe learned about the target.
#[derive(Debug, Clone)]
pub enum TlsProbeOutcome {
    /// Server negotiates a modern protocol; `verified` records whether the
    /// certificate also passed default verification.
    Modern {
        version: TlsVersionKind,
        verified: bool,
    },
    /// Server only completes handshakes on deprecated protocol versions
    /// (TLS 1.1 or older).
    LegacyOnly,
    /// Port 443 answers but no handshake variant succeeds.
    HandshakeFailed(String),
    /// Port 443 dead, port 80 alive.
    HttpOnly,
    Unreachable(String),
}

/// Runs the protocol security check against the target host.
pub async fn run(host: &str, budget: Duration) -> Result<CheckResult> {
    info!(host, "Starting protocol security check.");
    let outcome = probe_protocol(host, budget).await;
    let result = score_protocol(&outcome);
    info!(host, score = ?result.score, "Protocol security check finished.");
    Ok(result)
}

/// Maps the probe outcome onto the module sub-score.
pub fn score_protocol(outcome: &TlsProbeOutcome) -> CheckResult {
    match outcome {
        TlsProbeOutcome::Modern {
            verified: false,
            version,
        } => CheckResult::scored(
            0.4,
            vec![format!(
                "WARNING: HTTPS available ({}) but certificate verification failed",
                version.label()
            )],
        ),
        TlsProbeOutcome::Modern { version, .. } => {
            let (score, judgment) = match version {
                TlsVersionKind::Tls13 => (1.0, "modern"),
                TlsVersionKind::Tls12 => (0.9, "acceptable"),
                TlsVersionKind::Unknown => (0.8, "unrecognized"),
            };
            CheckResult::scored(
                score,
                vec![format!(
                    "Status: HTTPS connection with {judgment} TLS version ({})",
                    version.label()
                )],
            )
        }
        TlsProbeOutcome::LegacyOnly => CheckResult::scored(
            0.2,
            vec![
                "Status: HTTPS connection only possible with an INSECURE TLS version (TLS 1.1 or older)"
                    .to_string(),
            ],
        ),
        TlsProbeOutcome::HandshakeFailed(reason) => CheckResult::scored(
            0.3,
            vec![
                "HTTPS port answers but the TLS handshake failed".to_string(),
                format!("Reason: {reason}"),
            ],
        ),
        TlsProbeOutcome::HttpOnly => CheckResult::scored(
            0.0,
            vec!["Status: only insecure HTTP connection available (no SSL/TLS)".to_string()],
        ),
        TlsProbeOutcome::Unreachable(reason) => CheckResult::error(vec![format!(
            "Could not reach the host to probe its protocol: {reason}"
        )]),
    }
}

/// Determines the negotiated TLS version and verification status.
///
/// The version probe deliberately skips certificate verification: the
/// negotiated protocol is the same either way, and certificate quality is
/// judged separately. Verification status is then confirmed with a default
/// (verifying) handshake.
async fn probe_protocol(host: &str, budget: Duration) -> TlsProbeOutcome {
    let connect_timeout = budget.min(Duration::from_secs(10));

    let stream = match timeout(connect_timeout, TcpStream::connect((host, 443))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return if probe_http_port(host, connect_timeout).await {
                TlsProbeOutcome::HttpOnly
            } else {
                TlsProbeOutcome::Unreachable(format!("connection failed: {e}"))
            };
        }
        Err(_) => {
            return if probe_http_port(host, connect_timeout).await {
                TlsProbeOutcome::HttpOnly
            } else {
                TlsProbeOutcome::Unreachable("connection timed out".to_string())
            };
        }
    };

    let server_name = match ServerName::try_from(host) {
        Ok(name) => name,
        Err(e) => return TlsProbeOutcome::HandshakeFailed(format!("invalid server name: {e}")),
    };
    let connector = TlsConnector::from(Arc::new(version_probe_config()));

    debug!(host, "Performing rustls handshake for version detection.");
    match timeout(connect_timeout, connector.connect(server_name, stream)).await {
        Ok(Ok(tls_stream)) => {
            let (_, connection) = tls_stream.get_ref();
            let version = match connection.protocol_version() {
                Some(ProtocolVersion::TLSv1_3) => TlsVersionKind::Tls13,
                Some(ProtocolVersion::TLSv1_2) => TlsVersionKind::Tls12,
                _ => TlsVersionKind::Unknown,
            };
            let verified = verify_with_default_trust(host, connect_timeout).await;
            debug!(host, version = version.label(), verified, "Negotiated modern TLS.");
            TlsProbeOutcome::Modern { version, verified }
        }
        Ok(Err(e)) => {
            // rustls refuses anything below TLS 1.2; a server that still
            // handshakes through the legacy connector is legacy-only.
            warn!(host, error = %e, "Modern handshake failed, probing legacy protocols.");
            if legacy_handshake_succeeds(host, connect_timeout).await {
                TlsProbeOutcome::LegacyOnly
            } else {
                TlsProbeOutcome::HandshakeFailed(e.to_string())
            }
        }
        Err(_) => TlsProbeOutcome::HandshakeFailed("handshake timed out".to_string()),
    }
}

async fn probe_http_port(host: &str, connect_timeout: Duration) -> bool {
    matches!(
        timeout(connect_timeout, TcpStream::connect((host, 80))).await,
        Ok(Ok(_))
    )
}

/// Whether a default (verifying) native-tls handshake succeeds.
async fn verify_with_default_trust(host: &str, connect_timeout: Duration) -> bool {
    let host_owned = host.to_string();
    spawn_blocking(move || {
        let Ok(connector) = native_tls::TlsConnector::new() else {
            return false;
        };
        let Ok(stream) = blocking_connect(&host_owned, connect_timeout) else {
            return false;
        };
        connector.connect(&host_owned, stream).is_ok()
    })
    .await
    .unwrap_or(false)
}

/// Whether the server completes a handshake restricted to TLS 1.0/1.1.
async fn legacy_handshake_succeeds(host: &str, connect_timeout: Duration) -> bool {
    let host_owned = host.to_string();
    spawn_blocking(move || {
        let Ok(connector) = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .min_protocol_version(Some(Protocol::Tlsv10))
            .max_protocol_version(Some(Protocol::Tlsv11))
            .build()
        else {
            return false;
        };
        let Ok(stream) = blocking_connect(&host_owned, connect_timeout) else {
            return false;
        };
        connector.connect(&host_owned, stream).is_ok()
    })
    .await
    .unwrap_or(false)
}

fn blocking_connect(
    host: &str,
    connect_timeout: Duration,
) -> std::io::Result<std::net::TcpStream> {
    use std::net::ToSocketAddrs;
    let addr = (host, 443u16)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::other("host resolved to no addresses"))?;
    let stream = std::net::TcpStream::connect_timeout(&addr, connect_timeout)?;
    let _ = stream.set_read_timeout(Some(connect_timeout));
    let _ = stream.set_write_timeout(Some(connect_timeout));
    Ok(stream)
}

/// rustls client config that records the negotiated version without
/// enforcing certificate trust.
fn version_probe_config() -> ClientConfig {
    struct AcceptAnyCertificate;
    impl ServerCertVerifier for AcceptAnyCertificate {
        fn verify_server_cert(
            &self,
            _end_entity: &rustls::Certificate,
            _intermediates: &[rustls::Certificate],
            _server_name: &ServerName,
            _scts: &mut dyn Iterator<Item = &[u8]>,
            _ocsp_response: &[u8],
            _now: SystemTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }
    }

    ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CheckStatus;

    #[test]
    fn tls13_scores_perfect() {
        let result = score_protocol(&TlsProbeOutcome::Modern {
            version: TlsVersionKind::Tls13,
            verified: true,
        });
        assert_eq!(result.score, Some(1.0));
        assert!(result.details[0].contains("TLS 1.3"));
    }

    #[test]
    fn tls12_is_acceptable_but_not_perfect() {
        let result = score_protocol(&TlsProbeOutcome::Modern {
            version: TlsVersionKind::Tls12,
            verified: true,
        });
        assert!((result.score.unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn failed_verification_overrides_the_version_score() {
        let result = score_protocol(&TlsProbeOutcome::Modern {
            version: TlsVersionKind::Tls13,
            verified: false,
        });
        assert!((result.score.unwrap() - 0.4).abs() < 1e-9);
        assert!(result.details[0].contains("verification failed"));
    }

    #[test]
    fn legacy_only_servers_score_low() {
        let result = score_protocol(&TlsProbeOutcome::LegacyOnly);
        assert!((result.score.unwrap() - 0.2).abs() < 1e-9);
        assert!(result.details[0].contains("INSECURE"));
    }

    #[test]
    fn http_only_scores_zero_but_counts() {
        let result = score_protocol(&TlsProbeOutcome::HttpOnly);
        assert_eq!(result.score, Some(0.0));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn unreachable_hosts_are_an_error() {
        let result =
            score_protocol(&TlsProbeOutcome::Unreachable("connection timed out".to_string()));
        assert_eq!(result.status, CheckStatus::Error);
    }
}
