//! SslPolicy entity: TLS settings and the certificates a host presents

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::json::SslCertRef;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ssl_policies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub admin_id: i64,

    pub user_id: i64,

    pub is_on: bool,

    pub state: i16,

    /// JSON array of `{"isOn": bool, "certId": i64}`
    #[sea_orm(column_type = "Text")]
    pub certs: String,

    /// JSON array of client CA certificate references
    #[sea_orm(column_type = "Text", nullable)]
    pub client_ca_certs: Option<String>,

    pub client_auth_type: i32,

    pub min_version: String,

    pub cipher_suites_is_on: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub cipher_suites: Option<String>,

    /// JSON HSTS settings
    #[sea_orm(column_type = "Text", nullable)]
    pub hsts: Option<String>,

    pub http2_enabled: bool,

    pub http3_enabled: bool,

    pub ocsp_is_on: bool,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the certificate reference list (malformed JSON reads as empty)
    pub fn decode_cert_refs(&self) -> Vec<SslCertRef> {
        serde_json::from_str::<Option<Vec<SslCertRef>>>(&self.certs)
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}
