//! ACME account resolution
//!
//! Turns a task's account reference into an [`AccountContext`] the ACME
//! client can use: CA lookup (with the configured default), optional
//! rotation onto another account of the same CA, EAB credentials and the
//! decoded account key.

use certflow_acme::{
    decode_private_key, encode_private_key, find_provider, AccountContext,
    ExternalAccountBinding, Registration,
};
use certflow_db::entities::{acme_account, acme_provider_account};
use certflow_db::STATE_ENABLED;
use rand::seq::SliceRandom;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::{debug, info};

use crate::error::{EngineError, StoreError};

#[derive(Debug, Clone)]
pub struct AccountResolver {
    db: DatabaseConnection,
    default_ca_code: String,
}

impl AccountResolver {
    pub fn new(db: DatabaseConnection, default_ca_code: impl Into<String>) -> Self {
        Self {
            db,
            default_ca_code: default_ca_code.into(),
        }
    }

    pub async fn find_enabled_account(
        &self,
        account_id: i64,
    ) -> Result<Option<acme_account::Model>, StoreError> {
        Ok(acme_account::Entity::find_by_id(account_id)
            .filter(acme_account::Column::State.eq(STATE_ENABLED))
            .one(&self.db)
            .await?)
    }

    /// Pick a random enabled account registered with the same CA
    pub async fn find_random_account_with_same_provider(
        &self,
        provider_code: &str,
    ) -> Result<Option<acme_account::Model>, StoreError> {
        let ids: Vec<i64> = acme_account::Entity::find()
            .select_only()
            .column(acme_account::Column::Id)
            .filter(acme_account::Column::State.eq(STATE_ENABLED))
            .filter(acme_account::Column::ProviderCode.eq(provider_code))
            .into_tuple()
            .all(&self.db)
            .await?;

        let picked = ids.choose(&mut rand::thread_rng()).copied();
        match picked {
            Some(id) => self.find_enabled_account(id).await,
            None => Ok(None),
        }
    }

    /// Store what the CA returned on registration
    ///
    /// A key the CA bound the account to replaces the stored one.
    pub async fn update_registration(
        &self,
        account_id: i64,
        registration: &Registration,
    ) -> Result<(), StoreError> {
        let private_key = match &registration.private_key {
            Some(der) => Set(encode_private_key(der)),
            None => Default::default(),
        };
        acme_account::Entity::update_many()
            .set(acme_account::ActiveModel {
                registration: Set(Some(registration.resource.clone())),
                private_key,
                ..Default::default()
            })
            .filter(acme_account::Column::Id.eq(account_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// CA code of an account, falling back to the configured default
    fn provider_code<'a>(&'a self, account: &'a acme_account::Model) -> &'a str {
        let code = account.provider_code.trim();
        if code.is_empty() {
            &self.default_ca_code
        } else {
            code
        }
    }

    /// Resolve the account a run should use
    ///
    /// With `rotate`, a random enabled account of the same CA replaces the
    /// task's own; the task's account is kept when no other one exists.
    pub async fn resolve(
        &self,
        account_id: i64,
        rotate: bool,
    ) -> Result<AccountContext, EngineError> {
        let mut account = self
            .find_enabled_account(account_id)
            .await?
            .ok_or(EngineError::AccountNotFound)?;

        let provider_code = self.provider_code(&account).to_string();

        if rotate {
            if let Some(other) = self
                .find_random_account_with_same_provider(&provider_code)
                .await?
            {
                if other.id != account.id {
                    debug!(from = account.id, to = other.id, "Rotated ACME account");
                }
                account = other;
            }
        }

        let provider = find_provider(&provider_code)
            .ok_or_else(|| EngineError::ProviderUnavailable(provider_code.clone()))?;

        let eab = match account.provider_account_id.filter(|id| *id > 0) {
            Some(provider_account_id) => {
                let shared = acme_provider_account::Entity::find_by_id(provider_account_id)
                    .filter(acme_provider_account::Column::State.eq(STATE_ENABLED))
                    .filter(acme_provider_account::Column::IsOn.eq(true))
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| EngineError::EabAccountNotFound(provider_code.clone()))?;
                Some(ExternalAccountBinding {
                    kid: shared.eab_kid,
                    hmac_key: shared.eab_key,
                })
            }
            None if provider.requires_eab => {
                return Err(EngineError::EabAccountNotFound(provider_code));
            }
            None => None,
        };

        let private_key = decode_private_key(&account.private_key)
            .map_err(|e| EngineError::InvalidAccountKey(e.to_string()))?;

        info!(
            account_id = account.id,
            ca = provider.code,
            eab = eab.is_some(),
            "Resolved ACME account"
        );

        Ok(AccountContext {
            account_id: account.id,
            email: account.email,
            private_key,
            registration: account.registration.filter(|r| !r.trim().is_empty()),
            provider: provider.clone(),
            eab,
        })
    }
}
