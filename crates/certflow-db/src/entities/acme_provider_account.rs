//! AcmeProviderAccount entity: pre-provisioned EAB credentials shared by accounts

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acme_provider_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub provider_code: String,

    pub name: String,

    /// EAB key identifier issued by the CA
    pub eab_kid: String,

    /// EAB HMAC key (base64url, as issued by the CA)
    #[sea_orm(column_type = "Text")]
    pub eab_key: String,

    pub is_on: bool,

    pub state: i16,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
