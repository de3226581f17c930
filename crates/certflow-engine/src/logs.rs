//! Run history

use certflow_db::entities::acme_task_log;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct TaskLogStore {
    db: DatabaseConnection,
}

impl TaskLogStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn append(&self, task_id: i64, is_ok: bool, error: &str) -> Result<i64, StoreError> {
        let log = acme_task_log::ActiveModel {
            task_id: Set(task_id),
            is_ok: Set(is_ok),
            error: Set(error.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(log.id)
    }

    /// Most recent runs first
    pub async fn list_task_logs(
        &self,
        task_id: i64,
        limit: u64,
    ) -> Result<Vec<acme_task_log::Model>, StoreError> {
        Ok(acme_task_log::Entity::find()
            .filter(acme_task_log::Column::TaskId.eq(task_id))
            .order_by_desc(acme_task_log::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn find_latest_task_log(
        &self,
        task_id: i64,
    ) -> Result<Option<acme_task_log::Model>, StoreError> {
        Ok(acme_task_log::Entity::find()
            .filter(acme_task_log::Column::TaskId.eq(task_id))
            .order_by_desc(acme_task_log::Column::Id)
            .one(&self.db)
            .await?)
    }
}
