//! AcmeAccount entity: an identity registered with a certificate authority

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acme_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub admin_id: i64,

    pub user_id: i64,

    /// Contact email sent to the CA
    pub email: String,

    /// Base64-encoded PKCS#8 account key
    #[sea_orm(column_type = "Text")]
    pub private_key: String,

    /// CA registration resource, stored after the first successful registration
    #[sea_orm(column_type = "Text", nullable)]
    pub registration: Option<String>,

    /// CA provider code (empty means the system default)
    #[sea_orm(indexed)]
    pub provider_code: String,

    /// Shared external-account-binding credentials
    pub provider_account_id: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub state: i16,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
