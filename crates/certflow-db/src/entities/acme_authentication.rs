//! AcmeAuthentication entity: challenge token and expected response
//!
//! Rows are written once per challenge attempt so that an out-of-process HTTP
//! server can answer `/.well-known/acme-challenge/{token}`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acme_authentications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(indexed)]
    pub task_id: i64,

    pub domain: String,

    #[sea_orm(indexed)]
    pub token: String,

    /// Key authorization the CA expects back
    #[sea_orm(column_type = "Text")]
    pub key: String,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::acme_task::Entity",
        from = "Column::TaskId",
        to = "super::acme_task::Column::Id"
    )]
    Task,
}

impl Related<super::acme_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
