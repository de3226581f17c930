//! Issuance recording
//!
//! Persists issued material. A task that already owns a certificate renews it
//! in place so that every policy pointing at the id picks up the new
//! material; otherwise a new certificate row is created and bound.

use certflow_acme::{parse_certificate, CertInfo, IssuedCertificate};
use certflow_db::entities::{acme_task, ssl_cert};
use certflow_db::json::encode_string_list;
use certflow_db::STATE_ENABLED;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::task_store::TaskStore;

/// Certificate stored by a successful run
#[derive(Debug, Clone)]
pub struct RecordedCert {
    pub cert_id: i64,
    pub info: CertInfo,
    /// The row existed before this run
    pub renewed: bool,
}

#[derive(Debug, Clone)]
pub struct IssuanceRecorder {
    db: DatabaseConnection,
    tasks: TaskStore,
}

impl IssuanceRecorder {
    pub fn new(db: DatabaseConnection, tasks: TaskStore) -> Self {
        Self { db, tasks }
    }

    pub async fn record(
        &self,
        task: &acme_task::Model,
        issued: &IssuedCertificate,
    ) -> Result<RecordedCert, EngineError> {
        let info = parse_certificate(&issued.cert_pem)
            .map_err(|e| EngineError::NotSaved(e.to_string()))?;

        match task.cert_id.filter(|id| *id > 0) {
            Some(cert_id) => self.renew(task, cert_id, issued, info).await,
            None => self.insert(task, issued, info).await,
        }
    }

    async fn renew(
        &self,
        task: &acme_task::Model,
        cert_id: i64,
        issued: &IssuedCertificate,
        info: CertInfo,
    ) -> Result<RecordedCert, EngineError> {
        let existing = ssl_cert::Entity::find_by_id(cert_id)
            .filter(ssl_cert::Column::State.eq(STATE_ENABLED))
            .one(&self.db)
            .await
            .map_err(|e| EngineError::NotSaved(e.to_string()))?;

        let Some(existing) = existing else {
            warn!(task_id = task.id, cert_id, "Bound certificate removed, disabling task");
            self.tasks
                .unbind_and_disable(task.id)
                .await
                .map_err(|e| EngineError::NotSaved(e.to_string()))?;
            return Err(EngineError::CertificateRemoved);
        };

        let mut cert: ssl_cert::ActiveModel = existing.into();
        cert.cert_data = Set(issued.cert_pem.clone());
        cert.key_data = Set(issued.key_pem.clone());
        cert.time_begin_at = Set(info.not_before);
        cert.time_end_at = Set(info.not_after);
        cert.dns_names = Set(encode_string_list(&info.dns_names));
        cert.common_names = Set(encode_string_list(&info.common_names));
        cert.is_ca = Set(info.is_ca);
        cert.updated_at = Set(Utc::now());
        cert.update(&self.db)
            .await
            .map_err(|e| EngineError::NotSaved(e.to_string()))?;

        self.tasks
            .link_cert(task.id, cert_id)
            .await
            .map_err(|e| EngineError::NotSaved(e.to_string()))?;

        info!(task_id = task.id, cert_id, not_after = %info.not_after, "Renewed certificate");
        Ok(RecordedCert {
            cert_id,
            info,
            renewed: true,
        })
    }

    async fn insert(
        &self,
        task: &acme_task::Model,
        issued: &IssuedCertificate,
        info: CertInfo,
    ) -> Result<RecordedCert, EngineError> {
        let name = info.primary_name().unwrap_or_default().to_string();
        let now = Utc::now();

        let cert = ssl_cert::ActiveModel {
            admin_id: Set(task.admin_id),
            user_id: Set(task.user_id),
            is_on: Set(true),
            state: Set(STATE_ENABLED),
            name: Set(name.clone()),
            description: Set(String::new()),
            server_name: Set(name),
            is_ca: Set(info.is_ca),
            cert_data: Set(issued.cert_pem.clone()),
            key_data: Set(issued.key_pem.clone()),
            time_begin_at: Set(info.not_before),
            time_end_at: Set(info.not_after),
            dns_names: Set(encode_string_list(&info.dns_names)),
            common_names: Set(encode_string_list(&info.common_names)),
            is_acme: Set(true),
            acme_task_id: Set(Some(task.id)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| EngineError::NotSaved(e.to_string()))?;

        self.tasks
            .link_cert(task.id, cert.id)
            .await
            .map_err(|e| EngineError::NotSaved(e.to_string()))?;

        info!(task_id = task.id, cert_id = cert.id, not_after = %info.not_after, "Stored new certificate");
        Ok(RecordedCert {
            cert_id: cert.id,
            info,
            renewed: false,
        })
    }
}
