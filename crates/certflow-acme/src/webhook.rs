//! Generic REST DNS provider
//!
//! Lets operators plug any DNS vendor behind a small HTTP facade. API
//! parameters:
//!
//! ```json
//! {
//!     "endpoint": "https://dns-gateway.internal/api",
//!     "headers": {"Authorization": "Bearer ..."},
//!     "timeoutSeconds": 30
//! }
//! ```
//!
//! # Protocol
//!
//! ```text
//! GET    {endpoint}/zones/{zone}/records?name={name}&type={type}   -> [record]
//! POST   {endpoint}/zones/{zone}/records          {record}         -> record
//! PUT    {endpoint}/zones/{zone}/records/{id}     {record}
//! DELETE {endpoint}/zones/{zone}/records/{id}
//! ```
//!
//! Records use the [`DnsRecord`] JSON shape. A 404 on delete is treated as
//! already deleted.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::{Map, Value};
use tracing::debug;

use crate::dns_provider::{DnsProvider, DnsProviderError, DnsRecord, RecordType, DEFAULT_TTL};

/// Provider type stored in `dns_providers.provider_type`
pub const PROVIDER_TYPE: &str = "webhook";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_ROUTE: &str = "default";

struct Connection {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

/// DNS provider speaking the REST protocol described in the module docs
#[derive(Default)]
pub struct WebhookDnsProvider {
    conn: Option<Connection>,
    min_ttl: u32,
}

impl WebhookDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn conn(&self) -> Result<&Connection, DnsProviderError> {
        self.conn.as_ref().ok_or(DnsProviderError::NotAuthenticated)
    }

    fn records_url(&self, zone: &str) -> Result<String, DnsProviderError> {
        Ok(format!("{}/zones/{}/records", self.conn()?.endpoint, zone))
    }

    fn record_url(&self, zone: &str, id: &str) -> Result<String, DnsProviderError> {
        if id.is_empty() {
            return Err(DnsProviderError::Config(
                "record has no provider id".to_string(),
            ));
        }
        Ok(format!("{}/{}", self.records_url(zone)?, id))
    }

    /// TTL sent to the API for `record`
    fn effective_ttl(&self, record: &DnsRecord) -> u32 {
        let ttl = match (record.ttl, self.min_ttl) {
            (0, 0) => DEFAULT_TTL,
            (0, min) => min,
            (ttl, _) => ttl,
        };
        ttl.max(self.min_ttl)
    }

    fn outgoing(&self, record: &DnsRecord) -> DnsRecord {
        DnsRecord {
            ttl: self.effective_ttl(record),
            ..record.clone()
        }
    }
}

fn parse_headers(params: &Map<String, Value>) -> Result<HeaderMap, DnsProviderError> {
    let mut header_map = HeaderMap::new();
    header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let Some(headers) = params.get("headers") else {
        return Ok(header_map);
    };
    let headers: HashMap<String, String> = serde_json::from_value(headers.clone())
        .map_err(|e| DnsProviderError::Auth(format!("'headers' must be a string map: {}", e)))?;

    for (key, value) in &headers {
        let header_name = HeaderName::try_from(key.as_str()).map_err(|e| {
            DnsProviderError::Config(format!("invalid header name '{}': {}", key, e))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            DnsProviderError::Config(format!("invalid header value for '{}': {}", key, e))
        })?;
        header_map.insert(header_name, header_value);
    }

    Ok(header_map)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DnsProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    Err(DnsProviderError::Api {
        status: status.as_u16(),
        message: body,
    })
}

#[async_trait]
impl DnsProvider for WebhookDnsProvider {
    async fn authenticate(&mut self, params: &Map<String, Value>) -> Result<(), DnsProviderError> {
        let endpoint = params
            .get("endpoint")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if endpoint.is_empty() {
            return Err(DnsProviderError::Auth(
                "'endpoint' should not be empty".to_string(),
            ));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(DnsProviderError::Auth(format!(
                "'endpoint' must be an http(s) URL: {}",
                endpoint
            )));
        }

        let timeout = params
            .get("timeoutSeconds")
            .and_then(Value::as_u64)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let headers = parse_headers(params)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        self.conn = Some(Connection {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            headers,
        });
        Ok(())
    }

    fn set_min_ttl(&mut self, ttl: u32) {
        self.min_ttl = ttl;
    }

    async fn query_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>, DnsProviderError> {
        Ok(self
            .query_records(zone, name, record_type)
            .await?
            .into_iter()
            .next())
    }

    async fn query_records(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>, DnsProviderError> {
        let conn = self.conn()?;
        let url = self.records_url(zone)?;
        debug!(url = %url, name = %name, record_type = %record_type, "Querying records via webhook");

        let response = conn
            .client
            .get(&url)
            .headers(conn.headers.clone())
            .query(&[("name", name), ("type", record_type.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;

        let records: Vec<DnsRecord> = response.json().await.map_err(|e| {
            DnsProviderError::Parse(format!("failed to parse query response: {}", e))
        })?;
        Ok(records
            .into_iter()
            .filter(|record| record.name == name && record.record_type == record_type)
            .collect())
    }

    async fn add_record(
        &self,
        zone: &str,
        record: &DnsRecord,
    ) -> Result<DnsRecord, DnsProviderError> {
        let conn = self.conn()?;
        let url = self.records_url(zone)?;
        let outgoing = self.outgoing(record);
        debug!(url = %url, name = %record.name, "Creating record via webhook");

        let response = conn
            .client
            .post(&url)
            .headers(conn.headers.clone())
            .json(&outgoing)
            .send()
            .await?;
        let response = check_status(response).await?;

        let created: DnsRecord = response.json().await.map_err(|e| {
            DnsProviderError::Parse(format!("failed to parse create response: {}", e))
        })?;
        if created.id.is_empty() {
            return Err(DnsProviderError::Parse(
                "create response carries no record id".to_string(),
            ));
        }
        Ok(DnsRecord {
            id: created.id,
            ..outgoing
        })
    }

    async fn update_record(
        &self,
        zone: &str,
        existing: &DnsRecord,
        record: &DnsRecord,
    ) -> Result<(), DnsProviderError> {
        let conn = self.conn()?;
        let url = self.record_url(zone, &existing.id)?;
        let outgoing = DnsRecord {
            id: existing.id.clone(),
            ..self.outgoing(record)
        };
        debug!(url = %url, name = %record.name, "Updating record via webhook");

        let response = conn
            .client
            .put(&url)
            .headers(conn.headers.clone())
            .json(&outgoing)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_record(&self, zone: &str, record: &DnsRecord) -> Result<(), DnsProviderError> {
        let conn = self.conn()?;
        let url = self.record_url(zone, &record.id)?;
        debug!(url = %url, name = %record.name, "Deleting record via webhook");

        let response = conn
            .client
            .delete(&url)
            .headers(conn.headers.clone())
            .send()
            .await?;

        // 404 is acceptable - record may have been cleaned up already
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(id = %record.id, "Record already deleted");
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    fn default_route(&self) -> String {
        DEFAULT_ROUTE.to_string()
    }

    fn name(&self) -> &'static str {
        PROVIDER_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_requires_endpoint() {
        let mut provider = WebhookDnsProvider::new();
        let err = provider.authenticate(&params(json!({}))).await.unwrap_err();
        assert!(matches!(err, DnsProviderError::Auth(_)));

        let err = provider
            .authenticate(&params(json!({"endpoint": "ftp://dns"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DnsProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn test_authenticate_builds_urls() {
        let mut provider = WebhookDnsProvider::new();
        provider
            .authenticate(&params(json!({
                "endpoint": "https://dns.internal/api/",
                "headers": {"Authorization": "Bearer secret"}
            })))
            .await
            .unwrap();

        assert_eq!(
            provider.records_url("example.com").unwrap(),
            "https://dns.internal/api/zones/example.com/records"
        );
        assert_eq!(
            provider.record_url("example.com", "42").unwrap(),
            "https://dns.internal/api/zones/example.com/records/42"
        );
        assert!(provider.record_url("example.com", "").is_err());
        assert!(provider.conn().unwrap().headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_invalid_headers_rejected() {
        let mut provider = WebhookDnsProvider::new();
        let err = provider
            .authenticate(&params(json!({"endpoint": "https://dns", "headers": ["x"]})))
            .await
            .unwrap_err();
        assert!(matches!(err, DnsProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn test_unauthenticated_calls_fail() {
        let provider = WebhookDnsProvider::new();
        let err = provider
            .query_records("example.com", "_acme-challenge", RecordType::Txt)
            .await
            .unwrap_err();
        assert!(matches!(err, DnsProviderError::NotAuthenticated));
    }

    #[test]
    fn test_effective_ttl() {
        let mut provider = WebhookDnsProvider::new();
        let mut record = DnsRecord::txt("_acme-challenge", "v", DEFAULT_ROUTE);
        assert_eq!(provider.effective_ttl(&record), DEFAULT_TTL);

        provider.set_min_ttl(600);
        assert_eq!(provider.effective_ttl(&record), 600);

        record.ttl = 60;
        assert_eq!(provider.effective_ttl(&record), 600);

        provider.set_min_ttl(0);
        assert_eq!(provider.effective_ttl(&record), 60);
    }
}
