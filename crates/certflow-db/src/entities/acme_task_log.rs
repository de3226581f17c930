//! AcmeTaskLog entity: append-only record of one execution attempt

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acme_task_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(indexed)]
    pub task_id: i64,

    pub is_ok: bool,

    /// Failure message (empty on success)
    #[sea_orm(column_type = "Text")]
    pub error: String,

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
