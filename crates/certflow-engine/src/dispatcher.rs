//! Challenge dispatch
//!
//! Picks the validation method for a task, prepares the DNS provider for
//! DNS-01, and hands the order to the ACME client.

use std::sync::Arc;

use certflow_acme::{
    AccountContext, AcmeClient, AcmeError, ChallengeJob, DnsProvider, DnsProviderFactory,
    IssuedCertificate, Registration, Validation,
};
use certflow_db::entities::acme_task::{self, AuthType};
use certflow_db::entities::dns_provider;
use certflow_db::STATE_ENABLED;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::publisher::{AuthenticationStore, ChallengePublisher};

pub struct ChallengeDispatcher {
    db: DatabaseConnection,
    acme: Arc<dyn AcmeClient>,
    dns_factory: Arc<dyn DnsProviderFactory>,
    authentications: AuthenticationStore,
    http: reqwest::Client,
}

impl ChallengeDispatcher {
    pub fn new(
        db: DatabaseConnection,
        acme: Arc<dyn AcmeClient>,
        dns_factory: Arc<dyn DnsProviderFactory>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            authentications: AuthenticationStore::new(db.clone()),
            db,
            acme,
            dns_factory,
            http,
        }
    }

    pub fn authentications(&self) -> &AuthenticationStore {
        &self.authentications
    }

    /// Register an account with its CA
    pub async fn register(&self, account: &AccountContext) -> Result<Registration, EngineError> {
        self.acme
            .register(account)
            .await
            .map_err(|e| EngineError::Registration(e.to_string()))
    }

    /// Run the order for `task` and return the issued material
    pub async fn dispatch(
        &self,
        task: &acme_task::Model,
        account: AccountContext,
    ) -> Result<IssuedCertificate, EngineError> {
        let validation = self.validation_for(task).await?;
        let domains = task.decode_domains();
        if domains.is_empty() {
            return Err(EngineError::InvalidInput("task has no domains".to_string()));
        }

        info!(
            task_id = task.id,
            validation = validation.kind(),
            domains = ?domains,
            "Starting ACME order"
        );

        let handler = ChallengePublisher::new(
            self.authentications.clone(),
            self.http.clone(),
            task.id,
            task.auth_url().map(str::to_string),
        );

        let job = ChallengeJob {
            account,
            validation,
            domains,
            handler: Arc::new(handler),
        };

        self.acme.run_challenge(job).await.map_err(|e| match e {
            AcmeError::Provider(msg) => EngineError::DnsProvider(msg),
            other => EngineError::Acme(other),
        })
    }

    async fn validation_for(&self, task: &acme_task::Model) -> Result<Validation, EngineError> {
        match task.auth_type {
            AuthType::Http => Ok(Validation::Http01),
            AuthType::Dns => {
                let provider = self.dns_provider_for(task).await?;
                let zone = task.dns_domain.trim().trim_end_matches('.').to_ascii_lowercase();
                if zone.is_empty() {
                    return Err(EngineError::DnsProvider("DNS domain is empty".to_string()));
                }
                Ok(Validation::Dns01 { provider, zone })
            }
        }
    }

    /// Build and authenticate the DNS provider a task references
    async fn dns_provider_for(
        &self,
        task: &acme_task::Model,
    ) -> Result<Arc<dyn DnsProvider>, EngineError> {
        let provider_id = task
            .dns_provider_id
            .filter(|id| *id > 0)
            .ok_or(EngineError::DnsProviderNotFound)?;

        let row = dns_provider::Entity::find_by_id(provider_id)
            .filter(dns_provider::Column::State.eq(STATE_ENABLED))
            .one(&self.db)
            .await?
            .ok_or(EngineError::DnsProviderNotFound)?;

        let mut provider = self
            .dns_factory
            .create(&row.provider_type)
            .ok_or_else(|| EngineError::DnsProviderUnsupported(row.provider_type.clone()))?;

        let params = row
            .decode_api_params()
            .map_err(|e| EngineError::DnsProvider(format!("invalid API parameters: {}", e)))?;
        provider
            .authenticate(&params)
            .await
            .map_err(|e| EngineError::DnsProvider(e.to_string()))?;

        if row.min_ttl > 0 {
            provider.set_min_ttl(row.min_ttl as u32);
        }

        debug!(
            task_id = task.id,
            dns_provider_id = row.id,
            provider = provider.name(),
            "DNS provider ready"
        );
        Ok(Arc::from(provider))
    }
}
