//! SslCert entity: an issued or uploaded certificate with its key
//!
//! Renewal updates the row in place so that policies referencing the id keep
//! pointing at valid material.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ssl_certs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub admin_id: i64,

    pub user_id: i64,

    /// User-facing switch; superseded certificates are switched off
    pub is_on: bool,

    /// Soft-delete state (1 enabled, 0 deleted)
    pub state: i16,

    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub server_name: String,

    pub is_ca: bool,

    /// PEM certificate chain
    #[sea_orm(column_type = "Text")]
    pub cert_data: String,

    /// PEM private key
    #[sea_orm(column_type = "Text")]
    pub key_data: String,

    pub time_begin_at: ChronoDateTimeUtc,

    pub time_end_at: ChronoDateTimeUtc,

    /// JSON array of subject alternative DNS names
    #[sea_orm(column_type = "Text")]
    pub dns_names: String,

    /// JSON array of subject common names
    #[sea_orm(column_type = "Text")]
    pub common_names: String,

    /// Produced by an ACME task
    pub is_acme: bool,

    pub acme_task_id: Option<i64>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn decode_dns_names(&self) -> Vec<String> {
        crate::json::decode_string_list(&self.dns_names)
    }

    pub fn decode_common_names(&self) -> Vec<String> {
        crate::json::decode_string_list(&self.common_names)
    }
}
