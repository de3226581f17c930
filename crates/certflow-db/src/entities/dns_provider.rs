//! DnsProvider entity: credentials for a DNS vendor API

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dns_providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub admin_id: i64,

    pub user_id: i64,

    pub name: String,

    /// Vendor code, e.g. "cloudflare" or "huaweiDNS"
    pub provider_type: String,

    /// JSON object of vendor-specific API parameters
    #[sea_orm(column_type = "Text")]
    pub api_params: String,

    /// Lowest TTL the vendor accepts, in seconds (0 = vendor default)
    pub min_ttl: i32,

    pub state: i16,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the stored API parameters
    pub fn decode_api_params(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        if self.api_params.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        serde_json::from_str(&self.api_params)
    }
}
