//! JSON-encoded column payloads shared by the engine and the serving configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Encode a list of names as a JSON array (`[]` when empty, never `null`)
pub fn encode_string_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a JSON array of names; `null`, empty or malformed input reads as empty
pub fn decode_string_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str::<Option<Vec<String>>>(raw)
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Reference from a TLS policy to a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertRef {
    #[serde(default)]
    pub is_on: bool,
    pub cert_id: i64,
}

impl SslCertRef {
    pub fn enabled(cert_id: i64) -> Self {
        Self {
            is_on: true,
            cert_id,
        }
    }
}

/// Reference from a server's HTTPS settings to a TLS policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslPolicyRef {
    #[serde(default)]
    pub is_on: bool,
    pub ssl_policy_id: i64,
}

/// HTTPS settings of a server
///
/// Only the policy reference is interpreted; every other key (listen
/// addresses, protocol switches, ...) is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsConfig {
    #[serde(default)]
    pub is_on: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_policy_ref: Option<SslPolicyRef>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HttpsConfig {
    /// Policy id, when a policy is attached
    pub fn ssl_policy_id(&self) -> Option<i64> {
        self.ssl_policy_ref
            .filter(|policy_ref| policy_ref.ssl_policy_id > 0)
            .map(|policy_ref| policy_ref.ssl_policy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_list_never_null() {
        assert_eq!(encode_string_list(&[]), "[]");
        assert!(decode_string_list("null").is_empty());
        assert!(decode_string_list("").is_empty());
        assert!(decode_string_list("{not json").is_empty());
        assert_eq!(
            decode_string_list(r#"["a.example.com","b.example.com"]"#),
            vec!["a.example.com".to_string(), "b.example.com".to_string()]
        );
    }

    #[test]
    fn test_https_config_preserves_unknown_settings() {
        let raw = r#"{"isOn":true,"listen":[{"portRange":"443"}],"sslPolicyRef":{"isOn":true,"sslPolicyId":7}}"#;
        let config: HttpsConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.ssl_policy_id(), Some(7));
        assert!(config.extra.contains_key("listen"));

        let encoded = serde_json::to_value(&config).unwrap();
        assert_eq!(encoded["listen"][0]["portRange"], "443");
        assert_eq!(encoded["sslPolicyRef"]["sslPolicyId"], 7);
    }

    #[test]
    fn test_https_config_without_policy() {
        let config: HttpsConfig = serde_json::from_str(r#"{"isOn":true}"#).unwrap();
        assert_eq!(config.ssl_policy_id(), None);

        let zero: HttpsConfig =
            serde_json::from_str(r#"{"isOn":true,"sslPolicyRef":{"isOn":true,"sslPolicyId":0}}"#)
                .unwrap();
        assert_eq!(zero.ssl_policy_id(), None);
    }
}
