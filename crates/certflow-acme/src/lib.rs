//! ACME issuance seams
//!
//! Defines the collaborators the orchestration engine drives during a run:
//! the ACME protocol client, the per-domain authorization handler, and DNS
//! provider backends for DNS-01. Also carries the helpers shared by every
//! backend (CA registry, DNS-01 record publication, certificate inspection,
//! account key decoding).

pub mod cert_info;
pub mod client;
pub mod dns01;
pub mod dns_provider;
pub mod instant;
pub mod keys;
pub mod providers;
pub mod webhook;

pub use cert_info::{parse_certificate, CertInfo, CertInfoError};
pub use client::{
    AccountContext, AcmeClient, AcmeError, AuthorizationChallenge, AuthorizationHandler,
    ChallengeJob, ExternalAccountBinding, IssuedCertificate, Registration, Validation,
};
pub use dns_provider::{
    DnsProvider, DnsProviderError, DnsProviderFactory, DnsRecord, RecordType,
    StaticDnsProviderFactory,
};
pub use instant::InstantAcmeClient;
pub use keys::{decode_private_key, encode_private_key, KeyError};
pub use providers::{find_provider, CaProvider, DEFAULT_PROVIDER_CODE};
pub use webhook::WebhookDnsProvider;
