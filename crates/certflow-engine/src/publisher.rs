//! HTTP-01 challenge publication
//!
//! Each challenge is persisted as an authentication record so the
//! `.well-known` responder can answer for it, and, when the task has an auth
//! URL, pushed to that URL as `{"domain","token","key"}`. Neither step can
//! fail the run.

use async_trait::async_trait;
use certflow_acme::{AuthorizationChallenge, AuthorizationHandler};
use certflow_db::entities::acme_authentication;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::StoreError;

/// Webhook body
#[derive(Debug, Serialize)]
struct ChallengePayload<'a> {
    domain: &'a str,
    token: &'a str,
    key: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthenticationStore {
    db: DatabaseConnection,
}

impl AuthenticationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_authentication(
        &self,
        task_id: i64,
        challenge: &AuthorizationChallenge,
    ) -> Result<i64, StoreError> {
        let auth = acme_authentication::ActiveModel {
            task_id: Set(task_id),
            domain: Set(challenge.domain.clone()),
            token: Set(challenge.token.clone()),
            key: Set(challenge.key_authorization.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(auth.id)
    }

    /// Latest authentication written for a challenge token
    pub async fn find_authentication_with_token(
        &self,
        token: &str,
    ) -> Result<Option<acme_authentication::Model>, StoreError> {
        Ok(acme_authentication::Entity::find()
            .filter(acme_authentication::Column::Token.eq(token))
            .order_by_desc(acme_authentication::Column::Id)
            .one(&self.db)
            .await?)
    }
}

/// [`AuthorizationHandler`] for one task run
pub struct ChallengePublisher {
    store: AuthenticationStore,
    http: reqwest::Client,
    task_id: i64,
    auth_url: Option<String>,
}

impl ChallengePublisher {
    pub fn new(
        store: AuthenticationStore,
        http: reqwest::Client,
        task_id: i64,
        auth_url: Option<String>,
    ) -> Self {
        Self {
            store,
            http,
            task_id,
            auth_url,
        }
    }

    async fn notify(&self, url: &str, challenge: &AuthorizationChallenge) {
        let payload = ChallengePayload {
            domain: &challenge.domain,
            token: &challenge.token,
            key: &challenge.key_authorization,
        };

        let result = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(task_id = self.task_id, domain = %challenge.domain, "Validation webhook accepted");
            }
            Ok(response) => {
                warn!(
                    task_id = self.task_id,
                    domain = %challenge.domain,
                    url = %url,
                    status = %response.status(),
                    "Validation webhook returned non-success status"
                );
            }
            Err(e) => {
                error!(
                    task_id = self.task_id,
                    domain = %challenge.domain,
                    url = %url,
                    error = %e,
                    "Validation webhook failed"
                );
            }
        }
    }
}

#[async_trait]
impl AuthorizationHandler for ChallengePublisher {
    async fn on_authorization(&self, challenge: &AuthorizationChallenge) {
        if let Err(e) = self.store.create_authentication(self.task_id, challenge).await {
            error!(
                task_id = self.task_id,
                domain = %challenge.domain,
                error = %e,
                "Failed to save ACME authentication"
            );
        }

        if let Some(url) = self.auth_url.as_deref() {
            self.notify(url, challenge).await;
        }
    }
}
