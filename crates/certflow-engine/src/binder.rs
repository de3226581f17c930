//! Binding of issued certificates into host TLS policies
//!
//! Hosts are matched by exact server name. A host that already has a policy
//! gets its certificate list merged (superseded certificates dropped and
//! disabled along with the tasks renewing them); a host without one gets a
//! fresh policy. Every read-modify-write runs under a lock for the host, and
//! for the policy when one exists, so overlapping runs cannot lose each
//! other's references.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use certflow_db::entities::{server, ssl_cert, ssl_policy};
use certflow_db::json::{SslCertRef, SslPolicyRef};
use certflow_db::{STATE_DISABLED, STATE_ENABLED};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::task_store::TaskStore;

/// Minimum TLS version of policies created during binding
pub const DEFAULT_MIN_TLS_VERSION: &str = "TLS 1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    Host(i64),
    Policy(i64),
}

/// Coverage and expiry of a referenced certificate
#[derive(Debug, Clone)]
pub struct CertCoverage {
    pub dns_names: Vec<String>,
    pub not_after: DateTime<Utc>,
}

/// Whether `new` replaces `old`: it covers every name of `old` and outlives it
pub fn supersedes(new: &CertCoverage, old: &CertCoverage) -> bool {
    let covered: HashSet<String> = new
        .dns_names
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();
    let contains_all = old
        .dns_names
        .iter()
        .all(|name| covered.contains(&name.to_ascii_lowercase()));
    contains_all && old.not_after < new.not_after
}

/// Result of merging a certificate into a policy's reference list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRefs {
    pub refs: Vec<SslCertRef>,
    pub superseded: Vec<i64>,
}

/// Merge `new_cert_id` into `existing`
///
/// References whose certificate cannot be loaded (absent from `known`) are
/// kept as they are. Duplicates collapse onto their first occurrence.
pub fn merge_refs(
    existing: &[SslCertRef],
    new_cert_id: i64,
    new: &CertCoverage,
    known: &HashMap<i64, CertCoverage>,
) -> MergedRefs {
    let mut refs: Vec<SslCertRef> = Vec::with_capacity(existing.len() + 1);
    let mut superseded = Vec::new();

    for cert_ref in existing {
        if refs.iter().any(|r| r.cert_id == cert_ref.cert_id) {
            continue;
        }
        if cert_ref.cert_id != new_cert_id {
            if let Some(old) = known.get(&cert_ref.cert_id) {
                if supersedes(new, old) {
                    superseded.push(cert_ref.cert_id);
                    continue;
                }
            }
        }
        refs.push(*cert_ref);
    }

    if !refs.iter().any(|r| r.cert_id == new_cert_id) {
        refs.push(SslCertRef::enabled(new_cert_id));
    }

    MergedRefs { refs, superseded }
}

/// What a binding pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    pub hosts_matched: usize,
    pub policies_updated: Vec<i64>,
    pub policies_created: Vec<i64>,
    pub superseded: Vec<i64>,
    /// Hosts without HTTPS settings
    pub skipped_hosts: Vec<i64>,
    pub failed_hosts: Vec<i64>,
}

enum HostOutcome {
    Skipped,
    Updated { policy_id: i64, superseded: Vec<i64> },
    Created { policy_id: i64 },
}

#[derive(Debug, Clone)]
pub struct BindingMerger {
    db: DatabaseConnection,
    tasks: TaskStore,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl BindingMerger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            tasks: TaskStore::new(db.clone()),
            db,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Host and policy locks currently allocated
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Run `work` while holding the lock for `key`
    ///
    /// The lock entry is dropped again once nobody else holds or waits on it.
    async fn with_lock<T>(&self, key: LockKey, work: impl Future<Output = T>) -> T {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().await;
            work.await
        };
        drop(lock);
        self.locks
            .remove_if(&key, |_, held| Arc::strong_count(held) == 1);
        result
    }

    /// Bind `cert_id` to every host serving one of `domains`
    ///
    /// An empty `domains` falls back to the certificate's own DNS names.
    pub async fn bind(&self, cert_id: i64, domains: &[String]) -> Result<BindReport, EngineError> {
        let cert = ssl_cert::Entity::find_by_id(cert_id)
            .filter(ssl_cert::Column::State.eq(STATE_ENABLED))
            .one(&self.db)
            .await?
            .ok_or(EngineError::CertificateRemoved)?;
        let coverage = CertCoverage {
            dns_names: cert.decode_dns_names(),
            not_after: cert.time_end_at,
        };

        let mut names: Vec<String> = Vec::new();
        let source = if domains.is_empty() {
            &coverage.dns_names[..]
        } else {
            domains
        };
        for name in source {
            let name = name.trim().to_ascii_lowercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }

        let host_ids = self.find_host_ids(&names).await?;
        let mut report = BindReport {
            hosts_matched: host_ids.len(),
            ..Default::default()
        };

        for host_id in host_ids {
            match self.bind_host(host_id, &cert, &coverage).await {
                Ok(HostOutcome::Skipped) => {
                    debug!(host_id, cert_id, "Host has no HTTPS settings, skipped");
                    report.skipped_hosts.push(host_id);
                }
                Ok(HostOutcome::Updated {
                    policy_id,
                    superseded,
                }) => {
                    report.policies_updated.push(policy_id);
                    for old in superseded {
                        if !report.superseded.contains(&old) {
                            report.superseded.push(old);
                        }
                    }
                }
                Ok(HostOutcome::Created { policy_id }) => {
                    report.policies_created.push(policy_id);
                }
                Err(e) => {
                    error!(host_id, cert_id, error = %e, "Failed to bind certificate to host");
                    report.failed_hosts.push(host_id);
                }
            }
        }

        info!(
            cert_id,
            hosts = report.hosts_matched,
            updated = report.policies_updated.len(),
            created = report.policies_created.len(),
            superseded = ?report.superseded,
            "Certificate binding finished"
        );
        Ok(report)
    }

    /// Enabled hosts listing any of `names`, each id once
    async fn find_host_ids(&self, names: &[String]) -> Result<Vec<i64>, EngineError> {
        let mut ids: Vec<i64> = Vec::new();
        for name in names {
            // Names are already lowercase
            let candidates: Vec<(i64, String)> = server::Entity::find()
                .select_only()
                .column(server::Column::Id)
                .column(server::Column::ServerNames)
                .filter(server::Column::State.eq(STATE_ENABLED))
                .filter(
                    Expr::expr(Func::lower(Expr::col(server::Column::ServerNames)))
                        .like(format!("%\"{}\"%", name)),
                )
                .into_tuple()
                .all(&self.db)
                .await?;

            for (id, raw_names) in candidates {
                if ids.contains(&id) {
                    continue;
                }
                let exact = certflow_db::json::decode_string_list(&raw_names)
                    .iter()
                    .any(|server_name| server_name.trim().eq_ignore_ascii_case(name));
                if exact {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    async fn bind_host(
        &self,
        host_id: i64,
        cert: &ssl_cert::Model,
        coverage: &CertCoverage,
    ) -> Result<HostOutcome, EngineError> {
        self.with_lock(
            LockKey::Host(host_id),
            self.bind_locked_host(host_id, cert, coverage),
        )
        .await
    }

    async fn bind_locked_host(
        &self,
        host_id: i64,
        cert: &ssl_cert::Model,
        coverage: &CertCoverage,
    ) -> Result<HostOutcome, EngineError> {
        let Some(host) = server::Entity::find_by_id(host_id)
            .filter(server::Column::State.eq(STATE_ENABLED))
            .one(&self.db)
            .await?
        else {
            return Ok(HostOutcome::Skipped);
        };
        let Some(mut https) = host.decode_https() else {
            return Ok(HostOutcome::Skipped);
        };

        if let Some(policy_id) = https.ssl_policy_id() {
            let merged = self
                .with_lock(
                    LockKey::Policy(policy_id),
                    self.merge_into_policy(policy_id, cert.id, coverage),
                )
                .await?;
            if let Some(superseded) = merged {
                return Ok(HostOutcome::Updated {
                    policy_id,
                    superseded,
                });
            }
            warn!(host_id, policy_id, "Referenced TLS policy missing, creating a new one");
        }

        let policy_id = self.create_policy(&host, cert).await?;
        https.ssl_policy_ref = Some(SslPolicyRef {
            is_on: true,
            ssl_policy_id: policy_id,
        });
        let encoded = serde_json::to_string(&https)
            .map_err(|e| EngineError::InvalidInput(format!("HTTPS settings: {}", e)))?;

        server::Entity::update_many()
            .set(server::ActiveModel {
                https: Set(Some(encoded)),
                ..Default::default()
            })
            .filter(server::Column::Id.eq(host_id))
            .exec(&self.db)
            .await?;

        info!(host_id, policy_id, cert_id = cert.id, "Attached new TLS policy to host");
        Ok(HostOutcome::Created { policy_id })
    }

    /// Rewrite only the policy's certificate list
    ///
    /// Returns `None` when the policy no longer exists.
    async fn merge_into_policy(
        &self,
        policy_id: i64,
        cert_id: i64,
        coverage: &CertCoverage,
    ) -> Result<Option<Vec<i64>>, EngineError> {
        let Some(policy) = ssl_policy::Entity::find_by_id(policy_id)
            .filter(ssl_policy::Column::State.eq(STATE_ENABLED))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let existing = policy.decode_cert_refs();

        let referenced: Vec<i64> = existing
            .iter()
            .map(|r| r.cert_id)
            .filter(|id| *id != cert_id)
            .collect();
        let mut known = HashMap::new();
        if !referenced.is_empty() {
            let certs = ssl_cert::Entity::find()
                .filter(ssl_cert::Column::Id.is_in(referenced))
                .filter(ssl_cert::Column::State.eq(STATE_ENABLED))
                .all(&self.db)
                .await?;
            for old in certs {
                known.insert(
                    old.id,
                    CertCoverage {
                        dns_names: old.decode_dns_names(),
                        not_after: old.time_end_at,
                    },
                );
            }
        }

        let merged = merge_refs(&existing, cert_id, coverage, &known);
        let encoded = serde_json::to_string(&merged.refs)
            .map_err(|e| EngineError::InvalidInput(format!("certificate refs: {}", e)))?;

        let mut active: ssl_policy::ActiveModel = policy.into();
        active.certs = Set(encoded);
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        for old in &merged.superseded {
            if let Err(e) = self.retire_cert(*old).await {
                warn!(cert_id = old, error = %e, "Failed to disable superseded certificate");
            }
        }

        debug!(
            policy_id,
            cert_id,
            refs = merged.refs.len(),
            superseded = ?merged.superseded,
            "Merged certificate into TLS policy"
        );
        Ok(Some(merged.superseded))
    }

    /// Soft-delete a superseded certificate and stop the tasks renewing it
    async fn retire_cert(&self, cert_id: i64) -> Result<(), EngineError> {
        ssl_cert::Entity::update_many()
            .set(ssl_cert::ActiveModel {
                is_on: Set(false),
                state: Set(STATE_DISABLED),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(ssl_cert::Column::Id.eq(cert_id))
            .exec(&self.db)
            .await?;
        let tasks = self.tasks.disable_all_tasks_with_cert(cert_id).await?;
        info!(cert_id, tasks, "Superseded certificate disabled");
        Ok(())
    }

    /// New policy owned by the host's user, carrying only `cert`
    async fn create_policy(
        &self,
        host: &server::Model,
        cert: &ssl_cert::Model,
    ) -> Result<i64, EngineError> {
        let certs = serde_json::to_string(&[SslCertRef::enabled(cert.id)])
            .map_err(|e| EngineError::InvalidInput(format!("certificate refs: {}", e)))?;
        let now = Utc::now();

        let policy = ssl_policy::ActiveModel {
            admin_id: Set(0),
            user_id: Set(host.user_id),
            is_on: Set(true),
            state: Set(STATE_ENABLED),
            certs: Set(certs),
            client_ca_certs: Set(None),
            client_auth_type: Set(0),
            min_version: Set(DEFAULT_MIN_TLS_VERSION.to_string()),
            cipher_suites_is_on: Set(false),
            cipher_suites: Set(None),
            hsts: Set(None),
            http2_enabled: Set(false),
            http3_enabled: Set(false),
            ocsp_is_on: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(policy.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coverage(names: &[&str], days: i64) -> CertCoverage {
        CertCoverage {
            dns_names: names.iter().map(|n| n.to_string()).collect(),
            not_after: Utc::now() + Duration::days(days),
        }
    }

    #[test]
    fn test_supersedes_requires_coverage_and_later_expiry() {
        let old = coverage(&["a.example.com", "b.example.com"], 10);

        assert!(supersedes(
            &coverage(&["A.example.com", "b.example.com", "c.example.com"], 90),
            &old
        ));
        // Narrower
        assert!(!supersedes(&coverage(&["a.example.com"], 90), &old));
        // Expires first
        assert!(!supersedes(
            &coverage(&["a.example.com", "b.example.com"], 5),
            &old
        ));
    }

    #[test]
    fn test_merge_drops_superseded_and_keeps_unknown() {
        let existing = vec![
            SslCertRef::enabled(1),
            SslCertRef {
                is_on: false,
                cert_id: 2,
            },
            SslCertRef::enabled(3),
        ];
        let mut known = HashMap::new();
        known.insert(1, coverage(&["a.example.com"], 10));
        known.insert(3, coverage(&["z.example.com"], 10));

        let merged = merge_refs(&existing, 9, &coverage(&["a.example.com"], 90), &known);

        assert_eq!(merged.superseded, vec![1]);
        let ids: Vec<i64> = merged.refs.iter().map(|r| r.cert_id).collect();
        assert_eq!(ids, vec![2, 3, 9]);
        assert!(!merged.refs[0].is_on);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let new = coverage(&["a.example.com"], 90);
        let first = merge_refs(&[], 9, &new, &HashMap::new());
        let second = merge_refs(&first.refs, 9, &new, &HashMap::new());

        assert_eq!(second.refs, vec![SslCertRef::enabled(9)]);
        assert!(second.superseded.is_empty());
    }

    #[test]
    fn test_merge_collapses_duplicates() {
        let existing = vec![SslCertRef::enabled(4), SslCertRef::enabled(4)];
        let merged = merge_refs(&existing, 9, &coverage(&["x.example.com"], 90), &HashMap::new());
        let ids: Vec<i64> = merged.refs.iter().map(|r| r.cert_id).collect();
        assert_eq!(ids, vec![4, 9]);
    }
}
