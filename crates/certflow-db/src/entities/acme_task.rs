//! AcmeTask entity: one unit of certificate issuance work

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Domain validation method used by the CA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AuthType {
    /// DNS-01: TXT record under `_acme-challenge`
    #[sea_orm(string_value = "dns")]
    Dns,

    /// HTTP-01: token served from `/.well-known/acme-challenge/`
    #[sea_orm(string_value = "http")]
    Http,
}

/// Lifecycle status of a task
///
/// Numeric values are part of the stored format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum TaskStatus {
    /// Created, never run
    #[sea_orm(num_value = 0)]
    Pending,

    /// Certificate issued and bound
    #[sea_orm(num_value = 1)]
    Done,

    /// A run is in progress (or crashed; see `running_lease_until`)
    #[sea_orm(num_value = 2)]
    Running,

    /// The last run failed
    #[sea_orm(num_value = 3)]
    IssueFailed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acme_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning administrator (0 when user-owned)
    pub admin_id: i64,

    /// Owning user (0 means admin-owned)
    #[sea_orm(indexed)]
    pub user_id: i64,

    pub auth_type: AuthType,

    /// ACME account used to talk to the CA
    pub acme_account_id: i64,

    /// DNS provider configuration (DNS-01 only)
    pub dns_provider_id: Option<i64>,

    /// Zone the DNS-01 records are written into
    pub dns_domain: String,

    /// JSON array of domain names, never null
    #[sea_orm(column_type = "Text")]
    pub domains: String,

    pub auto_renew: bool,

    /// Callback receiving `{domain, token, key}` for HTTP-01 publication
    #[sea_orm(column_type = "Text", nullable)]
    pub auth_url: Option<String>,

    /// User-facing switch
    pub is_on: bool,

    /// Soft-delete state (1 enabled, 0 disabled)
    pub state: i16,

    pub status: TaskStatus,

    /// Expiry of the current `Running` claim
    pub running_lease_until: Option<ChronoDateTimeUtc>,

    /// Certificate produced by this task
    pub cert_id: Option<i64>,

    /// Scheduler-driven task
    pub is_async: bool,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::acme_task_log::Entity")]
    Logs,

    #[sea_orm(has_many = "super::acme_authentication::Entity")]
    Authentications,
}

impl Related<super::acme_task_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Logs.def()
    }
}

impl Related<super::acme_authentication::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Authentications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the stored domain list
    pub fn decode_domains(&self) -> Vec<String> {
        crate::json::decode_string_list(&self.domains)
    }

    /// Callback URL, if one is configured
    pub fn auth_url(&self) -> Option<&str> {
        self.auth_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}
