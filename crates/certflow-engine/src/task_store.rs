//! Task persistence and status transitions
//!
//! Status moves `Pending → Running → Done` or `Running → IssueFailed`. Every
//! transition is a single UPDATE so that concurrent runs never observe a
//! half-written task.

use certflow_db::entities::acme_task::{self, AuthType, TaskStatus};
use certflow_db::entities::ssl_cert;
use certflow_db::json::encode_string_list;
use certflow_db::{STATE_DISABLED, STATE_ENABLED};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{debug, info};

use crate::error::StoreError;

/// Fields of a new task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub admin_id: i64,
    pub user_id: i64,
    pub auth_type: AuthType,
    pub acme_account_id: i64,
    pub dns_provider_id: Option<i64>,
    pub dns_domain: String,
    pub domains: Vec<String>,
    pub auto_renew: bool,
    pub auth_url: Option<String>,
    pub is_async: bool,
}

/// Identity fields an owner may change after creation
///
/// Status and certificate reference are owned by the engine and cannot be
/// set through an update.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub auth_type: AuthType,
    pub acme_account_id: i64,
    pub dns_provider_id: Option<i64>,
    pub dns_domain: String,
    pub domains: Vec<String>,
    pub auto_renew: bool,
    pub auth_url: Option<String>,
}

/// Certificate condition used when listing tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertState {
    /// Bound certificate still valid
    Available,
    /// Bound certificate past its expiry
    Expired,
    /// Bound certificate valid but expiring within `days`
    Expiring { days: u32 },
}

/// Listing filter over enabled tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to one owner
    pub user_id: Option<i64>,
    /// Only user-owned tasks (ignored when `user_id` is set)
    pub user_only: bool,
    /// Substring of the domain list
    pub keyword: Option<String>,
    pub cert_state: Option<CertState>,
}

impl TaskFilter {
    fn condition(&self, now: DateTime<Utc>) -> Condition {
        let mut cond = Condition::all().add(acme_task::Column::State.eq(STATE_ENABLED));

        match self.user_id {
            Some(user_id) if user_id > 0 => {
                cond = cond.add(acme_task::Column::UserId.eq(user_id));
            }
            _ if self.user_only => {
                cond = cond.add(acme_task::Column::UserId.gt(0));
            }
            _ => {}
        }

        if let Some(keyword) = self.keyword.as_deref().map(str::trim) {
            if !keyword.is_empty() {
                cond = cond.add(acme_task::Column::Domains.contains(keyword));
            }
        }

        if let Some(state) = self.cert_state {
            let mut certs = Query::select();
            certs
                .column(ssl_cert::Column::Id)
                .from(ssl_cert::Entity)
                .and_where(ssl_cert::Column::State.eq(STATE_ENABLED));
            match state {
                CertState::Available => {
                    certs.and_where(ssl_cert::Column::TimeEndAt.gt(now));
                }
                CertState::Expired => {
                    certs.and_where(ssl_cert::Column::TimeEndAt.lte(now));
                }
                CertState::Expiring { days } => {
                    certs
                        .and_where(ssl_cert::Column::TimeEndAt.gt(now))
                        .and_where(
                            ssl_cert::Column::TimeEndAt.lte(now + Duration::days(days as i64)),
                        );
                }
            }
            cond = cond.add(acme_task::Column::CertId.in_subquery(certs.to_owned()));
        }

        cond
    }
}

/// Trim, lowercase and deduplicate a domain list; empty lists are rejected
pub fn normalize_domains(domains: &[String]) -> Result<Vec<String>, StoreError> {
    let mut normalized: Vec<String> = Vec::with_capacity(domains.len());
    for domain in domains {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if !domain.is_empty() && !normalized.contains(&domain) {
            normalized.push(domain);
        }
    }
    if normalized.is_empty() {
        return Err(StoreError::InvalidInput(
            "domain list must not be empty".to_string(),
        ));
    }
    Ok(normalized)
}

fn normalize_auth_url(auth_url: Option<String>) -> Option<String> {
    auth_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    db: DatabaseConnection,
}

impl TaskStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_task(&self, task: NewTask) -> Result<i64, StoreError> {
        let domains = normalize_domains(&task.domains)?;

        let model = acme_task::ActiveModel {
            admin_id: Set(task.admin_id),
            user_id: Set(task.user_id),
            auth_type: Set(task.auth_type),
            acme_account_id: Set(task.acme_account_id),
            dns_provider_id: Set(task.dns_provider_id.filter(|id| *id > 0)),
            dns_domain: Set(task.dns_domain.trim().to_string()),
            domains: Set(encode_string_list(&domains)),
            auto_renew: Set(task.auto_renew),
            auth_url: Set(normalize_auth_url(task.auth_url)),
            is_on: Set(true),
            state: Set(STATE_ENABLED),
            status: Set(TaskStatus::Pending),
            running_lease_until: Set(None),
            cert_id: Set(None),
            is_async: Set(task.is_async),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(task_id = model.id, domains = ?domains, "Created ACME task");
        Ok(model.id)
    }

    pub async fn update_task(&self, task_id: i64, update: TaskUpdate) -> Result<(), StoreError> {
        if task_id <= 0 {
            return Err(StoreError::InvalidInput(format!("invalid task id {}", task_id)));
        }
        let domains = normalize_domains(&update.domains)?;

        acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                auth_type: Set(update.auth_type),
                acme_account_id: Set(update.acme_account_id),
                dns_provider_id: Set(update.dns_provider_id.filter(|id| *id > 0)),
                dns_domain: Set(update.dns_domain.trim().to_string()),
                domains: Set(encode_string_list(&domains)),
                auto_renew: Set(update.auto_renew),
                auth_url: Set(normalize_auth_url(update.auth_url)),
                ..Default::default()
            })
            .filter(acme_task::Column::Id.eq(task_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Switch a task on or off; an in-flight run is not cancelled
    pub async fn set_task_on(&self, task_id: i64, is_on: bool) -> Result<(), StoreError> {
        acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                is_on: Set(is_on),
                ..Default::default()
            })
            .filter(acme_task::Column::Id.eq(task_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Soft-delete a task; its certificate is left untouched
    pub async fn disable_task(&self, task_id: i64) -> Result<(), StoreError> {
        acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                state: Set(STATE_DISABLED),
                ..Default::default()
            })
            .filter(acme_task::Column::Id.eq(task_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Soft-delete every enabled task bound to a certificate
    pub async fn disable_all_tasks_with_cert(&self, cert_id: i64) -> Result<u64, StoreError> {
        let result = acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                state: Set(STATE_DISABLED),
                ..Default::default()
            })
            .filter(acme_task::Column::State.eq(STATE_ENABLED))
            .filter(acme_task::Column::CertId.eq(cert_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Find a task regardless of its state
    pub async fn find_task(&self, task_id: i64) -> Result<Option<acme_task::Model>, StoreError> {
        Ok(acme_task::Entity::find_by_id(task_id).one(&self.db).await?)
    }

    pub async fn find_enabled_task(
        &self,
        task_id: i64,
    ) -> Result<Option<acme_task::Model>, StoreError> {
        Ok(acme_task::Entity::find_by_id(task_id)
            .filter(acme_task::Column::State.eq(STATE_ENABLED))
            .one(&self.db)
            .await?)
    }

    /// Whether `user_id` owns the enabled task
    pub async fn check_user_task(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError> {
        let count = acme_task::Entity::find()
            .filter(acme_task::Column::Id.eq(task_id))
            .filter(acme_task::Column::UserId.eq(user_id))
            .filter(acme_task::Column::State.eq(STATE_ENABLED))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn find_task_user_id(&self, task_id: i64) -> Result<Option<i64>, StoreError> {
        Ok(acme_task::Entity::find_by_id(task_id)
            .select_only()
            .column(acme_task::Column::UserId)
            .into_tuple::<i64>()
            .one(&self.db)
            .await?)
    }

    pub async fn count_tasks_with_account(&self, account_id: i64) -> Result<u64, StoreError> {
        Ok(acme_task::Entity::find()
            .filter(acme_task::Column::State.eq(STATE_ENABLED))
            .filter(acme_task::Column::AcmeAccountId.eq(account_id))
            .count(&self.db)
            .await?)
    }

    pub async fn count_tasks_with_dns_provider(
        &self,
        dns_provider_id: i64,
    ) -> Result<u64, StoreError> {
        Ok(acme_task::Entity::find()
            .filter(acme_task::Column::State.eq(STATE_ENABLED))
            .filter(acme_task::Column::DnsProviderId.eq(dns_provider_id))
            .count(&self.db)
            .await?)
    }

    /// Enabled tasks matching `filter`, newest first
    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        offset: u64,
        size: u64,
    ) -> Result<Vec<acme_task::Model>, StoreError> {
        Ok(acme_task::Entity::find()
            .filter(filter.condition(Utc::now()))
            .order_by_desc(acme_task::Column::Id)
            .offset(offset)
            .limit(size)
            .all(&self.db)
            .await?)
    }

    pub async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, StoreError> {
        Ok(acme_task::Entity::find()
            .filter(filter.condition(Utc::now()))
            .count(&self.db)
            .await?)
    }

    /// Tasks the scheduler may start, oldest id first
    ///
    /// Eligible: enabled, switched on, async, no certificate yet, created at
    /// least `stale_hours` before `now`, not excluded, and not held by a live
    /// `Running` lease.
    pub async fn list_issuable_tasks_at(
        &self,
        now: DateTime<Utc>,
        stale_hours: u32,
        limit: u64,
        exclude_ids: &[i64],
    ) -> Result<Vec<acme_task::Model>, StoreError> {
        let created_before = now - Duration::hours(stale_hours as i64);

        let mut query = acme_task::Entity::find()
            .filter(acme_task::Column::State.eq(STATE_ENABLED))
            .filter(acme_task::Column::IsOn.eq(true))
            .filter(acme_task::Column::IsAsync.eq(true))
            .filter(acme_task::Column::CertId.is_null())
            .filter(acme_task::Column::CreatedAt.lte(created_before))
            .filter(
                Condition::any()
                    .add(acme_task::Column::Status.ne(TaskStatus::Running))
                    .add(acme_task::Column::RunningLeaseUntil.is_null())
                    .add(acme_task::Column::RunningLeaseUntil.lte(now)),
            );
        if !exclude_ids.is_empty() {
            query = query.filter(acme_task::Column::Id.is_not_in(exclude_ids.iter().copied()));
        }

        let tasks = query
            .order_by_asc(acme_task::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        debug!(count = tasks.len(), "Listed issuable tasks");
        Ok(tasks)
    }

    /// Claim a task for a run until `lease_until`
    pub async fn mark_running(
        &self,
        task_id: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                status: Set(TaskStatus::Running),
                running_lease_until: Set(Some(lease_until)),
                ..Default::default()
            })
            .filter(acme_task::Column::Id.eq(task_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Set a terminal status and release the lease
    pub async fn set_status(&self, task_id: i64, status: TaskStatus) -> Result<(), StoreError> {
        acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                status: Set(status),
                running_lease_until: Set(None),
                ..Default::default()
            })
            .filter(acme_task::Column::Id.eq(task_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Bind a certificate; the task becomes `Done` in the same statement
    pub async fn link_cert(&self, task_id: i64, cert_id: i64) -> Result<(), StoreError> {
        acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                cert_id: Set(Some(cert_id)),
                status: Set(TaskStatus::Done),
                running_lease_until: Set(None),
                ..Default::default()
            })
            .filter(acme_task::Column::Id.eq(task_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Drop a vanished certificate binding and stop the task
    pub async fn unbind_and_disable(&self, task_id: i64) -> Result<(), StoreError> {
        acme_task::Entity::update_many()
            .set(acme_task::ActiveModel {
                cert_id: Set(None),
                status: Set(TaskStatus::IssueFailed),
                running_lease_until: Set(None),
                state: Set(STATE_DISABLED),
                ..Default::default()
            })
            .filter(acme_task::Column::Id.eq(task_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domains() {
        let domains = vec![
            " WWW.Example.com ".to_string(),
            "www.example.com.".to_string(),
            "".to_string(),
            "api.example.com".to_string(),
        ];
        assert_eq!(
            normalize_domains(&domains).unwrap(),
            vec!["www.example.com", "api.example.com"]
        );
        assert!(matches!(
            normalize_domains(&[" ".to_string()]),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(normalize_domains(&[]).is_err());
    }

    #[test]
    fn test_normalize_auth_url() {
        assert_eq!(normalize_auth_url(Some("  ".to_string())), None);
        assert_eq!(
            normalize_auth_url(Some(" https://hook ".to_string())),
            Some("https://hook".to_string())
        );
    }
}
