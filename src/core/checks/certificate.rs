// src/core/checks/certificate.rs

use crate::core::models::CheckResult;
use chrono::Utc;
use color_eyre::eyre::Result;
use native_tls::{HandshakeError, TlsConnector};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

/// Free/automated CAs frequently seen on phishing sites. Using one is not
/// bad by itself, only in combination with a bare DV certificate.
const FREE_CA_ISSUERS: &[&str] = &["Let's Encrypt", "cPanel", "ZeroSSL"];

/// High-reputation commercial CAs; a certificate from one of these earns a
/// small bonus.
const TRUSTED_ISSUERS: &[&str] = &[
    "Google Trust Services",
    "DigiCert",
    "Sectigo",
    "GlobalSign",
    "Entrust",
    "GoDaddy",
    "Cloudflare",
    "Amazon",
];

/// Attributes extracted from the peer certificate.
#[derive(Debug, Clone, Default)]
pub struct CertificateFields {
    pub issuer_org: String,
    pub issuer_cn: String,
    /// Subject carries an organization name (OV or EV).
    pub subject_has_org: bool,
    /// Subject carries a serialNumber attribute (typical of EV).
    pub subject_has_serial: bool,
    pub days_until_expiry: i64,
    pub expired: bool,
}

impl CertificateFields {
    fn validation_type(&self) -> &'static str {
        if self.subject_has_org && self.subject_has_serial {
            "EV (Extended Validation)"
        } else if self.subject_has_org {
            "OV (Organization Validation)"
        } else {
            "DV (Domain Validated)"
        }
    }

    fn issued_by_free_ca(&self) -> bool {
        FREE_CA_ISSUERS
            .iter()
            .any(|ca| self.issuer_org.contains(ca) || self.issuer_cn.contains(ca))
    }

    fn issued_by_trusted_ca(&self) -> bool {
        TRUSTED_ISSUERS
            .iter()
            .any(|ca| self.issuer_org.contains(ca) || self.issuer_cn.contains(ca))
    }
}

/// What the TLS probe found on port 443.
#[derive(Debug, Clone)]
pub enum CertProbe {
    Parsed(CertificateFields),
    /// Session established but the server presented no certificate.
    NoPeerCertificate,
    /// Handshake rejected by verification (self-signed, hostname mismatch,
    /// untrusted chain).
    VerificationFailed(String),
    /// Handshake broke for a non-verification reason.
    TlsError(String),
    /// Port 443 dead, port 80 alive.
    HttpOnly,
    Unreachable(String),
}

/// Runs the certificate quality check against the target host.
pub async fn run(host: &str, timeout: Duration) -> Result<CheckResult> {
    info!(host, "Starting certificate check.");
    let host_owned = host.to_string();
    // The handshake and parse are blocking; keep them off the async workers.
    let probe = spawn_blocking(move || probe_certificate(&host_owned, timeout)).await?;
    let result = score_certificate(&probe);
    info!(host, score = ?result.score, "Certificate check finished.");
    Ok(result)
}

/// Converts the probe outcome into the module sub-score.
///
/// Penalty-based from a validation-class baseline: DV 0.8, OV/EV 1.0, with
/// a trusted-CA bonus, a DV+free-CA penalty, and expiry penalties stacking
/// on top. Floor-clamped at 0.0.
pub fn score_certificate(probe: &CertProbe) -> CheckResult {
    match probe {
        CertProbe::Parsed(fields) if fields.expired => CheckResult::scored(
            0.1,
            vec![
                "Certificate is EXPIRED".to_string(),
                format!("Issuer: {}", display_issuer(fields)),
            ],
        ),
        CertProbe::Parsed(fields) => {
            let validation = fields.validation_type();
            let mut score: f64 = if fields.subject_has_org { 1.0 } else { 0.8 };
            let mut details = vec![
                format!("Status: valid certificate ({validation})"),
                format!("Issuer: {}", display_issuer(fields)),
                format!("Expires in: {} days", fields.days_until_expiry),
            ];

            if fields.issued_by_trusted_ca() {
                score = (score + 0.1).min(1.0);
                details.push("TRUSTED: certificate from a reputable CA".to_string());
            } else if !fields.subject_has_org && fields.issued_by_free_ca() {
                // The combination phishing kits reach for: domain-validated
                // and free.
                score -= 0.2;
                details.push("WARNING: issued by a free/automated CA".to_string());
            }

            if fields.days_until_expiry < 7 {
                score -= 0.2;
                details.push(format!(
                    "CRITICAL: certificate expires in {} days",
                    fields.days_until_expiry
                ));
            } else if fields.days_until_expiry < 30 {
                details.push(
                    "INFO: short-lived certificate (common security practice)".to_string(),
                );
            }

            CheckResult::scored(score, details)
        }
        CertProbe::NoPeerCertificate => CheckResult::scored(
            0.2,
            vec!["TLS session established but no certificate was presented".to_string()],
        ),
        CertProbe::VerificationFailed(reason) => CheckResult::scored(
            0.2,
            vec![
                "Certificate verification FAILED (self-signed or hostname mismatch)".to_string(),
                format!("Reason: {reason}"),
            ],
        ),
        CertProbe::TlsError(reason) => CheckResult::scored(
            0.2,
            vec![
                "SSL protocol error while inspecting the certificate".to_string(),
                format!("Reason: {reason}"),
            ],
        ),
        CertProbe::HttpOnly => CheckResult::scored(
            0.0,
            vec!["Status: no SSL certificate (HTTP-only website)".to_string()],
        ),
        CertProbe::Unreachable(reason) => CheckResult::error(vec![format!(
            "Could not reach the host to inspect its certificate: {reason}"
        )]),
    }
}

fn display_issuer(fields: &CertificateFields) -> String {
    if !fields.issuer_org.is_empty() {
        fields.issuer_org.clone()
    } else if !fields.issuer_cn.is_empty() {
        fields.issuer_cn.clone()
    } else {
        "Unknown".to_string()
    }
}

/// Connects to port 443, performs a verifying handshake, and parses the
/// peer certificate.
fn probe_certificate(host: &str, timeout: Duration) -> CertProbe {
    debug!(host, "Opening TCP connection to port 443.");
    let stream = match connect(host, 443, timeout) {
        Ok(s) => s,
        Err(e) => {
            // Dead 443 with a live 80 is an HTTP-only site, not an outage.
            return if connect(host, 80, timeout).is_ok() {
                debug!(host, "Port 443 closed but port 80 open; HTTP-only site.");
                CertProbe::HttpOnly
            } else {
                CertProbe::Unreachable(e)
            };
        }
    };

    let connector = match TlsConnector::new() {
        Ok(c) => c,
        Err(e) => return CertProbe::TlsError(format!("TLS connector error: {e}")),
    };

    debug!(host, "Performing verifying TLS handshake.");
    let tls_stream = match connector.connect(host, stream) {
        Ok(s) => s,
        Err(HandshakeError::Failure(e)) => {
            let message = e.to_string();
            warn!(host, error = %message, "TLS handshake rejected.");
            return if message.to_lowercase().contains("certificate")
                || message.to_lowercase().contains("self-signed")
                || message.to_lowercase().contains("hostname")
            {
                CertProbe::VerificationFailed(message)
            } else {
                CertProbe::TlsError(message)
            };
        }
        Err(HandshakeError::WouldBlock(_)) => {
            return CertProbe::TlsError("handshake interrupted".to_string());
        }
    };

    let cert = match tls_stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => return CertProbe::NoPeerCertificate,
        Err(e) => return CertProbe::TlsError(format!("could not get peer certificate: {e}")),
    };
    let der = match cert.to_der() {
        Ok(der) => der,
        Err(e) => return CertProbe::TlsError(format!("could not encode certificate: {e}")),
    };

    match parse_x509_certificate(&der) {
        Ok((_, x509)) => CertProbe::Parsed(extract_fields(&x509)),
        Err(e) => CertProbe::TlsError(format!("X.509 parse error: {e}")),
    }
}

fn extract_fields(x509: &X509Certificate) -> CertificateFields {
    let issuer = x509.issuer();
    let subject = x509.subject();

    let issuer_org = issuer
        .iter_organization()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or("")
        .to_string();
    let issuer_cn = issuer
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or("")
        .to_string();

    // serialNumber attribute of the subject DN (2.5.4.5), the usual marker
    // of an EV certificate.
    let serial_oid = x509_parser::der_parser::oid!(2.5.4.5);
    let subject_has_serial = subject.iter_by_oid(&serial_oid).next().is_some();
    let subject_has_org = subject.iter_organization().next().is_some();

    let now = Utc::now().timestamp();
    let not_after = x509.validity().not_after.timestamp();
    let not_before = x509.validity().not_before.timestamp();
    let days_until_expiry = (not_after - now) / 86_400;
    let expired = now < not_before || now > not_after;

    debug!(
        issuer = %issuer_org,
        has_org = subject_has_org,
        has_serial = subject_has_serial,
        days_until_expiry,
        "Parsed peer certificate."
    );
    CertificateFields {
        issuer_org,
        issuer_cn,
        subject_has_org,
        subject_has_serial,
        days_until_expiry,
        expired,
    }
}

fn connect(host: &str, port: u16, timeout: Duration) -> std::result::Result<TcpStream, String> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("address resolution failed: {e}"))?;
    let addr = addrs
        .next()
        .ok_or_else(|| "host resolved to no addresses".to_string())?;
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("connection failed: {e}"))?;
    let _ = stream.set_read_timeout(Some(timeout));
    let _ = stream.set_write_timeout(Some(timeout));
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CheckStatus;

    fn fields(
        issuer_org: &str,
        subject_has_org: bool,
        subject_has_serial: bool,
        days: i64,
    ) -> CertificateFields {
        CertificateFields {
            issuer_org: issuer_org.to_string(),
            issuer_cn: String::new(),
            subject_has_org,
            subject_has_serial,
            days_until_expiry: days,
            expired: false,
        }
    }

    #[test]
    fn ov_from_a_trusted_ca_scores_perfect() {
        let probe = CertProbe::Parsed(fields("DigiCert Inc", true, false, 200));
        let result = score_certificate(&probe);
        assert_eq!(result.score, Some(1.0));
        assert!(result.details.iter().any(|d| d.contains("OV")));
    }

    #[test]
    fn plain_dv_scores_the_dv_baseline() {
        let probe = CertProbe::Parsed(fields("Some Registrar CA", false, false, 200));
        let result = score_certificate(&probe);
        assert!((result.score.unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn dv_from_a_free_ca_is_penalized() {
        let probe = CertProbe::Parsed(fields("Let's Encrypt", false, false, 60));
        let result = score_certificate(&probe);
        assert!((result.score.unwrap() - 0.6).abs() < 1e-9);
        assert!(result.details.iter().any(|d| d.contains("free/automated CA")));
    }

    #[test]
    fn ev_certificates_are_recognized() {
        let probe = CertProbe::Parsed(fields("Entrust, Inc.", true, true, 300));
        let result = score_certificate(&probe);
        assert_eq!(result.score, Some(1.0));
        assert!(result.details.iter().any(|d| d.contains("EV")));
    }

    #[test]
    fn imminent_expiry_is_penalized() {
        let probe = CertProbe::Parsed(fields("DigiCert Inc", true, false, 3));
        let result = score_certificate(&probe);
        // 1.0 + 0.1 bonus capped at 1.0, then -0.2 for the expiry.
        assert!((result.score.unwrap() - 0.8).abs() < 1e-9);
        assert!(result.details.iter().any(|d| d.contains("CRITICAL")));
    }

    #[test]
    fn expired_certificates_score_near_zero_but_count() {
        let mut f = fields("DigiCert Inc", true, false, -10);
        f.expired = true;
        let result = score_certificate(&CertProbe::Parsed(f));
        assert_eq!(result.score, Some(0.1));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn verification_failure_scores_low_but_counts() {
        let probe = CertProbe::VerificationFailed("self-signed certificate".to_string());
        let result = score_certificate(&probe);
        assert_eq!(result.score, Some(0.2));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn http_only_sites_score_zero() {
        let result = score_certificate(&CertProbe::HttpOnly);
        assert_eq!(result.score, Some(0.0));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn unreachable_hosts_are_an_error() {
        let result = score_certificate(&CertProbe::Unreachable("connection failed".to_string()));
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.score, None);
    }
}
