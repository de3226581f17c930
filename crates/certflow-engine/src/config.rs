//! Engine configuration

use std::time::Duration;

use certflow_acme::DEFAULT_PROVIDER_CODE;
use serde::{Deserialize, Serialize};

/// Tunables shared by every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// CA used by accounts that do not name one
    pub default_ca_code: String,

    /// Bound on the HTTP-01 validation webhook POST
    pub webhook_timeout: Duration,

    /// How long a `Running` claim is honored before the scheduler may
    /// pick the task up again
    pub running_lease: Duration,

    /// User-Agent sent with webhook requests
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_ca_code: DEFAULT_PROVIDER_CODE.to_string(),
            webhook_timeout: Duration::from_secs(10),
            running_lease: Duration::from_secs(2 * 60 * 60),
            user_agent: format!("certflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl EngineConfig {
    pub(crate) fn running_lease(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.running_lease).unwrap_or_else(|_| chrono::Duration::hours(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_ca_code, "letsencrypt");
        assert_eq!(config.webhook_timeout, Duration::from_secs(10));
        assert_eq!(config.running_lease().num_hours(), 2);
        assert!(config.user_agent.starts_with("certflow/"));
    }

    #[test]
    fn test_partial_override() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"default_ca_code":"buypass"}"#).unwrap();
        assert_eq!(config.default_ca_code, "buypass");
        assert_eq!(config.webhook_timeout, Duration::from_secs(10));
    }
}
