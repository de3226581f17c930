//! ACME protocol client seam
//!
//! The engine hands a [`ChallengeJob`] to an [`AcmeClient`]; the client runs
//! the order against the CA and calls back into the job's
//! [`AuthorizationHandler`] for every HTTP-01 challenge it needs published.
//! DNS-01 challenges are published by the client itself through the job's
//! [`DnsProvider`](crate::DnsProvider).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::dns_provider::DnsProvider;
use crate::providers::CaProvider;

/// Errors that can occur during ACME operations
#[derive(Debug, Error)]
pub enum AcmeError {
    /// Failed to create, load or register the ACME account
    #[error("ACME account error: {0}")]
    Account(String),

    /// DNS provider failed while publishing a challenge
    #[error("DNS provider error: {0}")]
    Provider(String),

    /// CA could not validate domain control
    #[error("validation failed: {0}")]
    Validation(String),

    /// Order finalization or certificate download failed
    #[error("certificate issuance failed: {0}")]
    Issuance(String),
}

/// External account binding credentials
#[derive(Clone, PartialEq, Eq)]
pub struct ExternalAccountBinding {
    pub kid: String,

    /// Base64url HMAC key as issued by the CA
    pub hmac_key: String,
}

impl fmt::Debug for ExternalAccountBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalAccountBinding")
            .field("kid", &self.kid)
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}

/// Everything the client needs to act as an ACME account
#[derive(Clone)]
pub struct AccountContext {
    pub account_id: i64,
    pub email: String,

    /// DER account key
    pub private_key: Vec<u8>,

    /// Stored registration resource, if the account registered before
    pub registration: Option<String>,

    pub provider: CaProvider,
    pub eab: Option<ExternalAccountBinding>,
}

impl fmt::Debug for AccountContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountContext")
            .field("account_id", &self.account_id)
            .field("email", &self.email)
            .field("registered", &self.registration.is_some())
            .field("provider", &self.provider.code)
            .field("eab", &self.eab)
            .finish()
    }
}

/// Challenge data the CA expects to find for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationChallenge {
    pub domain: String,
    pub token: String,
    pub key_authorization: String,
}

/// Receives HTTP-01 challenges before the client tells the CA they are ready
///
/// Handlers must not fail the run; problems are theirs to log.
#[async_trait]
pub trait AuthorizationHandler: Send + Sync {
    async fn on_authorization(&self, challenge: &AuthorizationChallenge);
}

/// How domain control is proven
#[derive(Clone)]
pub enum Validation {
    Http01,
    Dns01 {
        provider: Arc<dyn DnsProvider>,
        /// Zone the challenge records are written into
        zone: String,
    },
}

impl Validation {
    pub fn kind(&self) -> &'static str {
        match self {
            Validation::Http01 => "http-01",
            Validation::Dns01 { .. } => "dns-01",
        }
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Http01 => f.write_str("Http01"),
            Validation::Dns01 { provider, zone } => f
                .debug_struct("Dns01")
                .field("provider", &provider.name())
                .field("zone", zone)
                .finish(),
        }
    }
}

/// One certificate order
#[derive(Clone)]
pub struct ChallengeJob {
    pub account: AccountContext,
    pub validation: Validation,
    pub domains: Vec<String>,
    pub handler: Arc<dyn AuthorizationHandler>,
}

impl fmt::Debug for ChallengeJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeJob")
            .field("account", &self.account)
            .field("validation", &self.validation)
            .field("domains", &self.domains)
            .finish()
    }
}

/// PEM material returned by the CA
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// PEM-encoded certificate chain, leaf first
    pub cert_pem: String,

    /// PEM-encoded private key
    pub key_pem: String,
}

impl fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("cert_pem_len", &self.cert_pem.len())
            .finish_non_exhaustive()
    }
}

/// Outcome of registering an account with its CA
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    /// Registration resource to store on the account
    pub resource: String,

    /// DER key the CA now knows the account by, when it is not the stored one
    pub private_key: Option<Vec<u8>>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("resource", &self.resource)
            .field("key_replaced", &self.private_key.is_some())
            .finish()
    }
}

/// ACME protocol client
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// Register the account with its CA
    async fn register(&self, account: &AccountContext) -> Result<Registration, AcmeError>;

    /// Run an order to completion
    async fn run_challenge(&self, job: ChallengeJob) -> Result<IssuedCertificate, AcmeError>;
}
