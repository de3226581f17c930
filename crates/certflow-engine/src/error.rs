//! Engine errors

use certflow_acme::AcmeError;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Failure category of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected before anything ran; never logged as a run
    InvalidInput,

    /// A referenced record is missing, disabled or unusable
    Lookup,

    /// A collaborator (CA, DNS vendor, webhook) failed
    Remote,

    /// The CA issued a certificate that could not be stored
    PartialSuccess,
}

/// Errors raised by the storage helpers
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("task {0} not found")]
    TaskNotFound(i64),

    #[error("task not enabled")]
    TaskDisabled,

    #[error("task already done")]
    TaskAlreadyDone,

    #[error("ACME account not found")]
    AccountNotFound,

    #[error("ACME provider '{0}' unavailable")]
    ProviderUnavailable(String),

    #[error("EAB account not found for provider '{0}'")]
    EabAccountNotFound(String),

    #[error("invalid ACME account key: {0}")]
    InvalidAccountKey(String),

    #[error("account registration failed: {0}")]
    Registration(String),

    #[error("DNS provider not found")]
    DnsProviderNotFound,

    #[error("DNS provider type '{0}' not supported")]
    DnsProviderUnsupported(String),

    #[error("DNS provider error: {0}")]
    DnsProvider(String),

    #[error("CA request failed: {0}")]
    Acme(#[from] AcmeError),

    #[error("certificate was removed")]
    CertificateRemoved,

    #[error("certificate issued but not saved: {0}")]
    NotSaved(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl EngineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EngineError::InvalidInput(_) => FailureKind::InvalidInput,
            EngineError::TaskNotFound(_)
            | EngineError::TaskDisabled
            | EngineError::TaskAlreadyDone
            | EngineError::AccountNotFound
            | EngineError::ProviderUnavailable(_)
            | EngineError::EabAccountNotFound(_)
            | EngineError::InvalidAccountKey(_)
            | EngineError::DnsProviderNotFound
            | EngineError::DnsProviderUnsupported(_)
            | EngineError::CertificateRemoved
            | EngineError::Database(_) => FailureKind::Lookup,
            EngineError::Registration(_)
            | EngineError::DnsProvider(_)
            | EngineError::Acme(_)
            | EngineError::HttpClient(_) => FailureKind::Remote,
            EngineError::NotSaved(_) => FailureKind::PartialSuccess,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidInput(msg) => EngineError::InvalidInput(msg),
            StoreError::Database(e) => EngineError::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            EngineError::InvalidInput("x".into()).kind(),
            FailureKind::InvalidInput
        );
        assert_eq!(EngineError::DnsProviderNotFound.kind(), FailureKind::Lookup);
        assert_eq!(
            EngineError::Acme(AcmeError::Validation("no TXT".into())).kind(),
            FailureKind::Remote
        );
        assert_eq!(
            EngineError::NotSaved("disk full".into()).kind(),
            FailureKind::PartialSuccess
        );
    }

    #[test]
    fn test_messages_name_the_stage() {
        assert!(EngineError::DnsProviderNotFound
            .to_string()
            .contains("DNS provider"));
        assert!(EngineError::NotSaved("x".into())
            .to_string()
            .contains("issued but not saved"));
        assert!(EngineError::Registration("x".into())
            .to_string()
            .contains("registration"));
    }

    #[test]
    fn test_store_error_conversion() {
        let err: EngineError = StoreError::InvalidInput("domains empty".into()).into();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
    }
}
