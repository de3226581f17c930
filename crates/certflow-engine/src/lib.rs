//! ACME task orchestration for tenant certificates
pub mod accounts;
pub mod binder;
pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod logs;
pub mod publisher;
pub mod recorder;
pub mod task_store;

pub use accounts::AccountResolver;
pub use binder::{merge_refs, supersedes, BindReport, BindingMerger, CertCoverage, MergedRefs};
pub use config::EngineConfig;
pub use dedup::{InFlightGuard, InFlightRegistry};
pub use dispatcher::ChallengeDispatcher;
pub use engine::{Engine, RunOutcome};
pub use error::{EngineError, FailureKind, StoreError};
pub use logs::TaskLogStore;
pub use publisher::{AuthenticationStore, ChallengePublisher};
pub use recorder::{IssuanceRecorder, RecordedCert};
pub use task_store::{normalize_domains, CertState, NewTask, TaskFilter, TaskStore, TaskUpdate};
