//! Built-in certificate authorities

use serde::Serialize;

/// Code of the CA used when an account does not name one
pub const DEFAULT_PROVIDER_CODE: &str = "letsencrypt";

/// An ACME certificate authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaProvider {
    /// Stable code stored on accounts
    pub code: &'static str,

    /// Human-readable name
    pub name: &'static str,

    /// ACME v2 directory URL
    pub directory_url: &'static str,

    /// Test/staging directory URL, when the CA offers one
    pub test_directory_url: Option<&'static str>,

    /// Account registration requires external account binding
    pub requires_eab: bool,
}

static PROVIDERS: &[CaProvider] = &[
    CaProvider {
        code: "letsencrypt",
        name: "Let's Encrypt",
        directory_url: "https://acme-v02.api.letsencrypt.org/directory",
        test_directory_url: Some("https://acme-staging-v02.api.letsencrypt.org/directory"),
        requires_eab: false,
    },
    CaProvider {
        code: "zerossl",
        name: "ZeroSSL",
        directory_url: "https://acme.zerossl.com/v2/DV90",
        test_directory_url: None,
        requires_eab: true,
    },
    CaProvider {
        code: "buypass",
        name: "Buypass",
        directory_url: "https://api.buypass.com/acme/directory",
        test_directory_url: Some("https://api.test4.buypass.no/acme/directory"),
        requires_eab: false,
    },
];

/// All built-in providers
pub fn all_providers() -> &'static [CaProvider] {
    PROVIDERS
}

/// Look up a provider by code (case-insensitive)
pub fn find_provider(code: &str) -> Option<&'static CaProvider> {
    PROVIDERS
        .iter()
        .find(|provider| provider.code.eq_ignore_ascii_case(code.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provider_exists() {
        let provider = find_provider(DEFAULT_PROVIDER_CODE).expect("default provider");
        assert!(!provider.requires_eab);
        assert!(provider.directory_url.starts_with("https://"));
    }

    #[test]
    fn test_find_provider_case_insensitive() {
        assert_eq!(find_provider("ZeroSSL").map(|p| p.code), Some("zerossl"));
        assert!(find_provider("zerossl").unwrap().requires_eab);
        assert!(find_provider("unknown-ca").is_none());
        assert!(find_provider("").is_none());
    }

    #[test]
    fn test_provider_codes_unique() {
        let mut codes: Vec<_> = all_providers().iter().map(|p| p.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all_providers().len());
    }
}
