//! Server entity: a served site (host) and its HTTPS settings
//!
//! Owned by the serving-configuration subsystem. The issuance engine only reads
//! `server_names` and rewrites the policy reference inside `https`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::json::HttpsConfig;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "servers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub admin_id: i64,

    pub user_id: i64,

    pub name: String,

    /// JSON array of plain server names
    #[sea_orm(column_type = "Text")]
    pub server_names: String,

    /// JSON HTTPS settings; null when the server has no HTTPS listener
    #[sea_orm(column_type = "Text", nullable)]
    pub https: Option<String>,

    pub is_on: bool,

    pub state: i16,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn decode_server_names(&self) -> Vec<String> {
        crate::json::decode_string_list(&self.server_names)
    }

    /// Decode the HTTPS settings; `None` when absent or unreadable
    pub fn decode_https(&self) -> Option<HttpsConfig> {
        let raw = self.https.as_deref()?;
        if raw.trim().is_empty() || raw.trim() == "null" {
            return None;
        }
        serde_json::from_str(raw).ok()
    }
}
