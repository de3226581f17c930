//! [`AcmeClient`] backed by instant-acme
//!
//! The account signs with its stored key. The registration resource kept for
//! an account is its account URL at the CA.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, ExternalAccountKey, Identifier, Key, NewAccount,
    NewOrder, Order, OrderStatus, RetryPolicy,
};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::{debug, info, warn};

use crate::client::{
    AccountContext, AcmeClient, AcmeError, AuthorizationChallenge, ChallengeJob,
    IssuedCertificate, Registration, Validation,
};
use crate::dns01;
use crate::dns_provider::DnsRecord;

/// Wait between publishing DNS-01 records and asking the CA to check them
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_secs(30);

/// ACME client talking to the account's CA directory
#[derive(Debug, Clone)]
pub struct InstantAcmeClient {
    /// Use the CA's test directory when it has one
    pub use_staging: bool,
    pub propagation_delay: Duration,
}

impl Default for InstantAcmeClient {
    fn default() -> Self {
        Self::new(false)
    }
}

impl InstantAcmeClient {
    pub fn new(use_staging: bool) -> Self {
        Self {
            use_staging,
            propagation_delay: DEFAULT_PROPAGATION_DELAY,
        }
    }

    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    fn directory_url(&self, account: &AccountContext) -> String {
        match (self.use_staging, account.provider.test_directory_url) {
            (true, Some(url)) => url.to_string(),
            _ => account.provider.directory_url.to_string(),
        }
    }

    /// Load the account, registering it first when it has no registration
    async fn load_account(
        &self,
        account: &AccountContext,
    ) -> Result<(Account, Option<Registration>), AcmeError> {
        let directory_url = self.directory_url(account);

        if let Some(resource) = account.registration.as_deref() {
            let key = stored_key(account)?;
            let restored = Account::builder()
                .map_err(|e| AcmeError::Account(e.to_string()))?
                .from_parts(resource.to_string(), key, directory_url)
                .await
                .map_err(|e| AcmeError::Account(format!("failed to restore account: {}", e)))?;
            return Ok((restored, None));
        }

        let contact = format!("mailto:{}", account.email);
        let contacts = [contact.as_str()];

        match &account.eab {
            Some(binding) => {
                // instant-acme only binds an external account to a key it generates
                let hmac_key = URL_SAFE_NO_PAD
                    .decode(binding.hmac_key.trim_end_matches('='))
                    .map_err(|e| AcmeError::Account(format!("invalid EAB key: {}", e)))?;
                let eab = ExternalAccountKey::new(binding.kid.clone(), &hmac_key);
                let new_account = NewAccount {
                    contact: &contacts,
                    terms_of_service_agreed: true,
                    only_return_existing: false,
                };

                info!(
                    account_id = account.account_id,
                    ca = account.provider.code,
                    "Creating ACME account with external binding"
                );
                let (created, credentials) = Account::builder()
                    .map_err(|e| AcmeError::Account(e.to_string()))?
                    .create(&new_account, directory_url, Some(&eab))
                    .await
                    .map_err(|e| AcmeError::Account(format!("failed to create account: {}", e)))?;

                let registration = Registration {
                    resource: created.id().to_string(),
                    private_key: Some(credentials.private_key().secret_pkcs8_der().to_vec()),
                };
                Ok((created, Some(registration)))
            }
            None if account.provider.requires_eab => Err(AcmeError::Account(format!(
                "provider '{}' requires external account binding",
                account.provider.code
            ))),
            None => {
                let der = stored_key(account)?;
                let key = Key::from_pkcs8_der(der.clone_key())
                    .map_err(|e| AcmeError::Account(format!("unsupported account key: {}", e)))?;

                info!(
                    account_id = account.account_id,
                    ca = account.provider.code,
                    "Creating ACME account"
                );
                let (created, _) = Account::builder()
                    .map_err(|e| AcmeError::Account(e.to_string()))?
                    .create_from_key((key, PrivateKeyDer::Pkcs8(der)), directory_url)
                    .await
                    .map_err(|e| AcmeError::Account(format!("failed to create account: {}", e)))?;

                if let Err(e) = created.update_contacts(&contacts).await {
                    warn!(
                        account_id = account.account_id,
                        error = %e,
                        "Failed to set account contact"
                    );
                }

                let registration = Registration {
                    resource: created.id().to_string(),
                    private_key: None,
                };
                Ok((created, Some(registration)))
            }
        }
    }

    /// Publish every pending challenge, then ask the CA to validate them
    async fn validate(
        &self,
        order: &mut Order,
        job: &ChallengeJob,
        published: &mut Vec<DnsRecord>,
    ) -> Result<OrderStatus, AcmeError> {
        let challenge_type = match job.validation {
            Validation::Http01 => ChallengeType::Http01,
            Validation::Dns01 { .. } => ChallengeType::Dns01,
        };

        let mut pending = 0usize;
        let mut authorizations = order.authorizations();
        while let Some(result) = authorizations.next().await {
            let mut authz =
                result.map_err(|e| AcmeError::Validation(format!("authorization failed: {}", e)))?;
            match authz.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => continue,
                status => {
                    return Err(AcmeError::Validation(format!(
                        "unexpected authorization status: {:?}",
                        status
                    )))
                }
            }

            let challenge = authz.challenge(challenge_type.clone()).ok_or_else(|| {
                AcmeError::Validation(format!("CA offered no {} challenge", job.validation.kind()))
            })?;
            let domain = challenge.identifier().to_string();
            let key_authorization = challenge.key_authorization().as_str().to_string();

            match &job.validation {
                Validation::Http01 => {
                    let data = AuthorizationChallenge {
                        domain,
                        token: challenge.token.clone(),
                        key_authorization,
                    };
                    job.handler.on_authorization(&data).await;
                }
                Validation::Dns01 { provider, zone } => {
                    let record = dns01::publish_challenge(
                        provider.as_ref(),
                        zone,
                        &domain,
                        &key_authorization,
                        published.as_slice(),
                    )
                    .await
                    .map_err(|e| AcmeError::Provider(e.to_string()))?;
                    published.push(record);
                }
            }
            pending += 1;
        }

        if pending > 0 {
            if !published.is_empty() && !self.propagation_delay.is_zero() {
                debug!(
                    records = published.len(),
                    delay_secs = self.propagation_delay.as_secs(),
                    "Waiting for DNS propagation"
                );
                tokio::time::sleep(self.propagation_delay).await;
            }

            let mut authorizations = order.authorizations();
            while let Some(result) = authorizations.next().await {
                let mut authz = result
                    .map_err(|e| AcmeError::Validation(format!("authorization failed: {}", e)))?;
                if authz.status != AuthorizationStatus::Pending {
                    continue;
                }
                let mut challenge = authz.challenge(challenge_type.clone()).ok_or_else(|| {
                    AcmeError::Validation(format!(
                        "CA offered no {} challenge",
                        job.validation.kind()
                    ))
                })?;
                challenge.set_ready().await.map_err(|e| {
                    AcmeError::Validation(format!("failed to set challenge ready: {}", e))
                })?;
            }
            debug!(challenges = pending, "Challenges ready");
        }

        order
            .poll_ready(&RetryPolicy::default())
            .await
            .map_err(|e| AcmeError::Validation(e.to_string()))
    }
}

/// The account's stored key in the form instant-acme signs with
fn stored_key(account: &AccountContext) -> Result<PrivatePkcs8KeyDer<'static>, AcmeError> {
    if account.private_key.is_empty() {
        return Err(AcmeError::Account("account key is empty".to_string()));
    }
    Ok(PrivatePkcs8KeyDer::from(account.private_key.clone()))
}

#[async_trait]
impl AcmeClient for InstantAcmeClient {
    async fn register(&self, account: &AccountContext) -> Result<Registration, AcmeError> {
        match self.load_account(account).await? {
            (_, Some(registration)) => Ok(registration),
            (_, None) => account
                .registration
                .clone()
                .map(|resource| Registration {
                    resource,
                    private_key: None,
                })
                .ok_or_else(|| AcmeError::Account("account has no registration".to_string())),
        }
    }

    async fn run_challenge(&self, job: ChallengeJob) -> Result<IssuedCertificate, AcmeError> {
        let (account, _) = self.load_account(&job.account).await?;

        let identifiers: Vec<Identifier> = job
            .domains
            .iter()
            .map(|domain| Identifier::Dns(domain.clone()))
            .collect();
        let mut order = account
            .new_order(&NewOrder::new(&identifiers))
            .await
            .map_err(|e| AcmeError::Issuance(format!("order creation failed: {}", e)))?;

        let mut published: Vec<DnsRecord> = Vec::new();
        let status = self.validate(&mut order, &job, &mut published).await;

        if let Validation::Dns01 { provider, zone } = &job.validation {
            for record in &published {
                dns01::cleanup_challenge(provider.as_ref(), zone, record).await;
            }
        }

        match status? {
            OrderStatus::Ready => {}
            other => {
                return Err(AcmeError::Validation(format!(
                    "order not ready: {:?}",
                    other
                )))
            }
        }

        let key = rcgen::KeyPair::generate()
            .map_err(|e| AcmeError::Issuance(format!("failed to generate key: {}", e)))?;
        let mut params = rcgen::CertificateParams::new(job.domains.clone())
            .map_err(|e| AcmeError::Issuance(format!("invalid domain: {}", e)))?;
        params.distinguished_name = rcgen::DistinguishedName::new();
        let csr = params
            .serialize_request(&key)
            .map_err(|e| AcmeError::Issuance(format!("failed to build CSR: {}", e)))?;

        order
            .finalize_csr(csr.der())
            .await
            .map_err(|e| AcmeError::Issuance(format!("failed to finalize order: {}", e)))?;
        let cert_pem = order
            .poll_certificate(&RetryPolicy::default())
            .await
            .map_err(|e| AcmeError::Issuance(format!("failed to get certificate: {}", e)))?;

        Ok(IssuedCertificate {
            cert_pem,
            key_pem: key.serialize_pem(),
        })
    }
}
