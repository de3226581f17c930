//! Engine entry points
//!
//! A run walks the task through `Running`, resolves its account, drives the
//! ACME order, records the certificate and settles the final status. The
//! outcome is appended to the task log after the run, whatever happened.

use std::sync::Arc;

use certflow_acme::{AcmeClient, DnsProviderFactory};
use certflow_db::entities::acme_task::{self, TaskStatus};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::accounts::AccountResolver;
use crate::binder::{BindReport, BindingMerger};
use crate::config::EngineConfig;
use crate::dedup::InFlightRegistry;
use crate::dispatcher::ChallengeDispatcher;
use crate::error::{EngineError, FailureKind};
use crate::logs::TaskLogStore;
use crate::publisher::AuthenticationStore;
use crate::recorder::{IssuanceRecorder, RecordedCert};
use crate::task_store::TaskStore;

/// Result of one entry-point call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub ok: bool,
    /// Empty on success
    pub message: String,
    pub cert_id: Option<i64>,
    pub kind: Option<FailureKind>,
}

impl RunOutcome {
    fn success(cert_id: Option<i64>) -> Self {
        Self {
            ok: true,
            message: String::new(),
            cert_id,
            kind: None,
        }
    }

    fn failure(err: &EngineError) -> Self {
        Self {
            ok: false,
            message: err.to_string(),
            cert_id: None,
            kind: Some(err.kind()),
        }
    }
}

/// How a run was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Direct run by id; renewal of a `Done` task allowed
    Direct,
    /// Scheduler or auto-bind run; accounts rotate, `Done` tasks refused
    AutoBind,
}

pub struct Engine {
    tasks: TaskStore,
    accounts: AccountResolver,
    dispatcher: ChallengeDispatcher,
    recorder: IssuanceRecorder,
    binder: BindingMerger,
    logs: TaskLogStore,
    in_flight: InFlightRegistry,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        db: DatabaseConnection,
        acme: Arc<dyn AcmeClient>,
        dns_factory: Arc<dyn DnsProviderFactory>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(config.webhook_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let tasks = TaskStore::new(db.clone());
        Ok(Self {
            accounts: AccountResolver::new(db.clone(), config.default_ca_code.clone()),
            dispatcher: ChallengeDispatcher::new(db.clone(), acme, dns_factory, http),
            recorder: IssuanceRecorder::new(db.clone(), tasks.clone()),
            binder: BindingMerger::new(db.clone()),
            logs: TaskLogStore::new(db),
            in_flight: InFlightRegistry::new(),
            tasks,
            config,
        })
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn accounts(&self) -> &AccountResolver {
        &self.accounts
    }

    pub fn logs(&self) -> &TaskLogStore {
        &self.logs
    }

    pub fn authentications(&self) -> &AuthenticationStore {
        self.dispatcher.authentications()
    }

    pub fn binder(&self) -> &BindingMerger {
        &self.binder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Task ids with an auto-bind run in progress in this process
    pub fn in_flight_ids(&self) -> Vec<i64> {
        self.in_flight.ids()
    }

    /// Tasks the scheduler may start now
    pub async fn list_issuable_tasks(
        &self,
        stale_hours: u32,
        limit: u64,
        exclude_ids: &[i64],
    ) -> Result<Vec<acme_task::Model>, EngineError> {
        Ok(self
            .tasks
            .list_issuable_tasks_at(Utc::now(), stale_hours, limit, exclude_ids)
            .await?)
    }

    /// Run a task by id
    pub async fn run_task(&self, task_id: i64) -> RunOutcome {
        let result = self.run(task_id, RunMode::Direct).await;
        self.finish(task_id, result).await
    }

    /// Run a task and bind the certificate to the hosts serving `domains`
    ///
    /// A second call for a task id that is already running here returns
    /// success without doing anything.
    pub async fn run_task_and_bind(&self, task_id: i64, domains: &[String]) -> RunOutcome {
        let Some(_guard) = self.in_flight.try_acquire(task_id) else {
            return RunOutcome::success(None);
        };

        let result = self.run(task_id, RunMode::AutoBind).await;
        if let Ok(recorded) = &result {
            match self.binder.bind(recorded.cert_id, domains).await {
                Ok(report) => log_bind_report(task_id, &report),
                Err(e) => {
                    error!(task_id, cert_id = recorded.cert_id, error = %e, "Certificate binding failed");
                }
            }
        }
        self.finish(task_id, result).await
    }

    async fn run(&self, task_id: i64, mode: RunMode) -> Result<RecordedCert, EngineError> {
        if task_id <= 0 {
            return Err(EngineError::InvalidInput(format!("invalid task id {}", task_id)));
        }

        let task = self
            .tasks
            .find_enabled_task(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound(task_id))?;

        match self.execute(&task, mode).await {
            Ok(recorded) => Ok(recorded),
            Err(err) => {
                self.settle_failure(&task, &err).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        task: &acme_task::Model,
        mode: RunMode,
    ) -> Result<RecordedCert, EngineError> {
        if !task.is_on {
            return Err(EngineError::TaskDisabled);
        }
        if mode == RunMode::AutoBind && task.status == TaskStatus::Done && task.cert_id.is_some() {
            return Err(EngineError::TaskAlreadyDone);
        }

        let lease_until = Utc::now() + self.config.running_lease();
        self.tasks.mark_running(task.id, lease_until).await?;
        debug!(task_id = task.id, lease_until = %lease_until, "Task running");

        let mut account = self
            .accounts
            .resolve(task.acme_account_id, mode == RunMode::AutoBind)
            .await?;

        if account.registration.is_none() {
            let registration = self.dispatcher.register(&account).await?;
            self.accounts
                .update_registration(account.account_id, &registration)
                .await
                .map_err(|e| EngineError::Registration(e.to_string()))?;
            info!(account_id = account.account_id, "Registered ACME account");
            if let Some(der) = registration.private_key {
                account.private_key = der;
            }
            account.registration = Some(registration.resource);
        }

        let issued = self.dispatcher.dispatch(task, account).await?;
        self.recorder.record(task, &issued).await
    }

    /// Leave the task in a terminal status after a failed run
    async fn settle_failure(&self, task: &acme_task::Model, err: &EngineError) {
        let status = match err {
            EngineError::InvalidInput(_) | EngineError::TaskNotFound(_) => return,
            EngineError::CertificateRemoved => TaskStatus::IssueFailed,
            _ if task.cert_id.is_some() => TaskStatus::Done,
            _ => TaskStatus::IssueFailed,
        };
        if let Err(e) = self.tasks.set_status(task.id, status).await {
            error!(task_id = task.id, error = %e, "Failed to update task status");
        }
    }

    async fn finish(&self, task_id: i64, result: Result<RecordedCert, EngineError>) -> RunOutcome {
        let outcome = match &result {
            Ok(recorded) => {
                info!(
                    task_id,
                    cert_id = recorded.cert_id,
                    renewed = recorded.renewed,
                    "Task run succeeded"
                );
                RunOutcome::success(Some(recorded.cert_id))
            }
            Err(err) => {
                warn!(task_id, kind = ?err.kind(), error = %err, "Task run failed");
                RunOutcome::failure(err)
            }
        };

        let skip_log = matches!(
            result,
            Err(EngineError::InvalidInput(_)) | Err(EngineError::TaskNotFound(_))
        );
        if !skip_log {
            if let Err(e) = self.logs.append(task_id, outcome.ok, &outcome.message).await {
                error!(task_id, error = %e, "Failed to write task log");
            }
        }

        outcome
    }
}

fn log_bind_report(task_id: i64, report: &BindReport) {
    if !report.failed_hosts.is_empty() {
        warn!(task_id, failed_hosts = ?report.failed_hosts, "Some hosts could not be bound");
    }
    debug!(task_id, report = ?report, "Bind report");
}
