//! DNS provider abstraction for ACME DNS-01 challenges
//!
//! A provider is constructed per run from a stored configuration
//! (`provider_type` + JSON API parameters), authenticated, and then used to
//! manage records inside one zone. Implementations must be `Send + Sync` so
//! the ACME client can share them across authorizations.
//!
//! # Lifecycle
//!
//! 1. `DnsProviderFactory::create(provider_type)` builds an unauthenticated client
//! 2. `authenticate(params)` consumes the decoded API parameters
//! 3. `set_min_ttl(seconds)` applies the vendor's lowest accepted TTL
//! 4. Records are queried / added / updated / deleted relative to the zone

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// TTL used when neither the record nor the provider specifies one
pub const DEFAULT_TTL: u32 = 300;

/// Errors that can occur during DNS provider operations
#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// DNS API returned an error
    #[error("DNS API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse API response
    #[error("failed to parse API response: {0}")]
    Parse(String),

    /// Zone not found for domain
    #[error("zone not found for domain: {0}")]
    ZoneNotFound(String),

    /// Missing or invalid API parameters
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Used before `authenticate`
    #[error("provider is not authenticated")]
    NotAuthenticated,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record inside a zone
///
/// `name` is relative to the zone (`_acme-challenge.www`, or `_acme-challenge`
/// for the apex). `id` is assigned by the provider and empty for new records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub value: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub ttl: u32,
}

impl DnsRecord {
    pub fn txt(name: impl Into<String>, value: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            record_type: RecordType::Txt,
            value: value.into(),
            route: route.into(),
            ttl: 0,
        }
    }
}

/// Trait for DNS vendor APIs that can manage records in a zone
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Consume the decoded API parameters (keys, endpoints, ...)
    async fn authenticate(&mut self, params: &Map<String, Value>) -> Result<(), DnsProviderError>;

    /// Lowest TTL the vendor accepts; 0 keeps the provider default
    fn set_min_ttl(&mut self, ttl: u32);

    /// Find a single record by relative name and type
    async fn query_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>, DnsProviderError>;

    /// Find every record with the given relative name and type
    async fn query_records(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>, DnsProviderError>;

    /// Create a record; returns it with the provider-assigned id
    async fn add_record(
        &self,
        zone: &str,
        record: &DnsRecord,
    ) -> Result<DnsRecord, DnsProviderError>;

    /// Replace `existing` (matched by id) with `record`
    async fn update_record(
        &self,
        zone: &str,
        existing: &DnsRecord,
        record: &DnsRecord,
    ) -> Result<(), DnsProviderError>;

    async fn delete_record(&self, zone: &str, record: &DnsRecord) -> Result<(), DnsProviderError>;

    /// Route (resolution line) used when the caller does not pick one
    fn default_route(&self) -> String;

    /// Get provider name for logging
    fn name(&self) -> &'static str;
}

/// Builds unauthenticated provider clients from a stored `provider_type`
pub trait DnsProviderFactory: Send + Sync {
    /// `None` when the type is not supported
    fn create(&self, provider_type: &str) -> Option<Box<dyn DnsProvider>>;
}

type ProviderCtor = Arc<dyn Fn() -> Box<dyn DnsProvider> + Send + Sync>;

/// Factory backed by a table of constructors keyed by provider type
#[derive(Clone, Default)]
pub struct StaticDnsProviderFactory {
    ctors: HashMap<String, ProviderCtor>,
}

impl StaticDnsProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory knowing the providers shipped with this crate
    pub fn builtin() -> Self {
        Self::new().with(crate::webhook::PROVIDER_TYPE, || {
            Box::new(crate::webhook::WebhookDnsProvider::new())
        })
    }

    pub fn with<F>(mut self, provider_type: &str, ctor: F) -> Self
    where
        F: Fn() -> Box<dyn DnsProvider> + Send + Sync + 'static,
    {
        self.ctors
            .insert(provider_type.to_ascii_lowercase(), Arc::new(ctor));
        self
    }

    pub fn provider_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.ctors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl DnsProviderFactory for StaticDnsProviderFactory {
    fn create(&self, provider_type: &str) -> Option<Box<dyn DnsProvider>> {
        self.ctors
            .get(&provider_type.to_ascii_lowercase())
            .map(|ctor| ctor())
    }
}

impl fmt::Debug for StaticDnsProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticDnsProviderFactory")
            .field("provider_types", &self.provider_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_wire_format() {
        let record = DnsRecord::txt("_acme-challenge", "digest", "default");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "TXT");
        assert_eq!(json["name"], "_acme-challenge");

        let parsed: DnsRecord =
            serde_json::from_str(r#"{"id":"7","name":"www","type":"CNAME","value":"x"}"#).unwrap();
        assert_eq!(parsed.record_type, RecordType::Cname);
        assert_eq!(parsed.ttl, 0);
    }

    #[test]
    fn test_builtin_factory() {
        let factory = StaticDnsProviderFactory::builtin();
        assert!(factory.create("webhook").is_some());
        assert!(factory.create("WEBHOOK").is_some());
        assert!(factory.create("no-such-vendor").is_none());
        assert_eq!(factory.provider_types(), vec!["webhook"]);
    }

    #[test]
    fn test_dns_provider_error_display() {
        let err = DnsProviderError::ZoneNotFound("example.com".to_string());
        assert!(err.to_string().contains("example.com"));

        let err = DnsProviderError::Api {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("forbidden"));
    }
}
