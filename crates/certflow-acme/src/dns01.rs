//! DNS-01 record publication
//!
//! The TXT value for a challenge is `base64url(sha256(key_authorization))`,
//! published at `_acme-challenge.<domain>`. Records are written relative to
//! the task's zone through a [`DnsProvider`].

use tracing::{debug, warn};

use crate::dns_provider::{DnsProvider, DnsProviderError, DnsRecord, RecordType};

/// Label prefixed to the validated name
pub const CHALLENGE_LABEL: &str = "_acme-challenge";

/// Compute the DNS-01 challenge digest
///
/// Per RFC 8555 Section 8.4, the TXT record value is:
/// `base64url(sha256(key_authorization))`
pub fn compute_dns01_digest(key_authorization: &str) -> String {
    use base64::Engine;
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(key_authorization.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
}

/// Name of the challenge record relative to `zone`
///
/// Wildcards validate on their base name. Domains outside the zone yield
/// `ZoneNotFound`.
pub fn challenge_record_name(domain: &str, zone: &str) -> Result<String, DnsProviderError> {
    let domain = domain
        .trim()
        .trim_end_matches('.')
        .trim_start_matches("*.")
        .to_ascii_lowercase();
    let zone = zone.trim().trim_end_matches('.').to_ascii_lowercase();

    if zone.is_empty() {
        return Err(DnsProviderError::ZoneNotFound(domain));
    }
    if domain == zone {
        return Ok(CHALLENGE_LABEL.to_string());
    }

    match domain.strip_suffix(&format!(".{}", zone)) {
        Some(sub) if !sub.is_empty() => Ok(format!("{}.{}", CHALLENGE_LABEL, sub)),
        _ => Err(DnsProviderError::ZoneNotFound(domain)),
    }
}

/// Publish the TXT value for `domain`
///
/// A stale record left under the same name by an earlier run is updated in
/// place; otherwise a new one is added on the provider's default route.
/// Records in `current` (published earlier in the same order, e.g. for the
/// apex of a wildcard) are never overwritten.
pub async fn publish_challenge(
    provider: &dyn DnsProvider,
    zone: &str,
    domain: &str,
    key_authorization: &str,
    current: &[DnsRecord],
) -> Result<DnsRecord, DnsProviderError> {
    let name = challenge_record_name(domain, zone)?;
    let value = compute_dns01_digest(key_authorization);
    let record = DnsRecord::txt(&name, value, provider.default_route());

    let stale = provider
        .query_records(zone, &name, RecordType::Txt)
        .await?
        .into_iter()
        .find(|existing| !current.iter().any(|published| published.id == existing.id));

    match stale {
        Some(existing) => {
            debug!(provider = provider.name(), zone = %zone, name = %name, "Updating TXT record");
            provider.update_record(zone, &existing, &record).await?;
            Ok(DnsRecord {
                id: existing.id,
                ..record
            })
        }
        None => {
            debug!(provider = provider.name(), zone = %zone, name = %name, "Adding TXT record");
            provider.add_record(zone, &record).await
        }
    }
}

/// Remove a published challenge record
///
/// This is best-effort cleanup; errors are logged and swallowed.
pub async fn cleanup_challenge(provider: &dyn DnsProvider, zone: &str, record: &DnsRecord) {
    if let Err(e) = provider.delete_record(zone, record).await {
        warn!(
            provider = provider.name(),
            zone = %zone,
            name = %record.name,
            error = %e,
            "Failed to delete challenge record"
        );
    }
}
