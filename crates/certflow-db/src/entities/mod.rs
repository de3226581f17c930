//! Database entities

pub mod acme_account;
pub mod acme_authentication;
pub mod acme_provider_account;
pub mod acme_task;
pub mod acme_task_log;
pub mod dns_provider;
pub mod server;
pub mod ssl_cert;
pub mod ssl_policy;

pub use acme_account::Entity as AcmeAccount;
pub use acme_authentication::Entity as AcmeAuthentication;
pub use acme_provider_account::Entity as AcmeProviderAccount;
pub use acme_task::Entity as AcmeTask;
pub use acme_task_log::Entity as AcmeTaskLog;
pub use dns_provider::Entity as DnsProvider;
pub use server::Entity as Server;
pub use ssl_cert::Entity as SslCert;
pub use ssl_policy::Entity as SslPolicy;

pub mod prelude {
    pub use super::acme_account::Entity as AcmeAccount;
    pub use super::acme_authentication::Entity as AcmeAuthentication;
    pub use super::acme_provider_account::Entity as AcmeProviderAccount;
    pub use super::acme_task::Entity as AcmeTask;
    pub use super::acme_task_log::Entity as AcmeTaskLog;
    pub use super::dns_provider::Entity as DnsProvider;
    pub use super::server::Entity as Server;
    pub use super::ssl_cert::Entity as SslCert;
    pub use super::ssl_policy::Entity as SslPolicy;
}
