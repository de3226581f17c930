//! X.509 inspection of issued certificates

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

#[derive(Debug, Error)]
pub enum CertInfoError {
    #[error("invalid PEM: {0}")]
    Pem(String),

    #[error("invalid X.509 certificate: {0}")]
    X509(String),

    #[error("certificate validity out of range")]
    Validity,
}

/// Facts extracted from the leaf certificate of a PEM chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,

    /// Subject alternative DNS names, in certificate order
    pub dns_names: Vec<String>,

    /// Subject common names
    pub common_names: Vec<String>,

    pub is_ca: bool,
}

impl CertInfo {
    /// Name used when displaying the certificate
    pub fn primary_name(&self) -> Option<&str> {
        self.dns_names
            .first()
            .or_else(|| self.common_names.first())
            .map(String::as_str)
    }
}

/// Parse the first certificate of a PEM chain
pub fn parse_certificate(cert_pem: &str) -> Result<CertInfo, CertInfoError> {
    let (_, pem) =
        parse_x509_pem(cert_pem.as_bytes()).map_err(|e| CertInfoError::Pem(e.to_string()))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| CertInfoError::X509(e.to_string()))?;

    let validity = cert.validity();
    let not_before =
        DateTime::from_timestamp(validity.not_before.timestamp(), 0).ok_or(CertInfoError::Validity)?;
    let not_after =
        DateTime::from_timestamp(validity.not_after.timestamp(), 0).ok_or(CertInfoError::Validity)?;

    let mut dns_names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns_name) = name {
                dns_names.push(dns_name.to_string());
            }
        }
    }

    let common_names = cert
        .subject()
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .map(str::to_string)
        .collect();

    Ok(CertInfo {
        not_before,
        not_after,
        dns_names,
        common_names,
        is_ca: cert.is_ca(),
    })
}
