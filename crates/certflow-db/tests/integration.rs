//! Integration tests for certflow-db
//!
//! Tests database operations with real SQLite in-memory database

use chrono::{Duration, Utc};
use certflow_db::entities::acme_task::{AuthType, TaskStatus};
use certflow_db::entities::{acme_task, acme_task_log, server, ssl_policy};
use certflow_db::json::{encode_string_list, SslCertRef};
use certflow_db::{connect, migrate, STATE_ENABLED};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set,
};

/// Helper to create a test database
async fn setup_test_db() -> sea_orm::DatabaseConnection {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    db
}

fn new_task(domains: &[&str]) -> acme_task::ActiveModel {
    let domains: Vec<String> = domains.iter().map(|d| d.to_string()).collect();
    acme_task::ActiveModel {
        admin_id: Set(1),
        user_id: Set(0),
        auth_type: Set(AuthType::Http),
        acme_account_id: Set(1),
        dns_provider_id: Set(None),
        dns_domain: Set(String::new()),
        domains: Set(encode_string_list(&domains)),
        auto_renew: Set(true),
        auth_url: Set(None),
        is_on: Set(true),
        state: Set(STATE_ENABLED),
        status: Set(TaskStatus::Pending),
        running_lease_until: Set(None),
        cert_id: Set(None),
        is_async: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_database_connection() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let backend = db.get_database_backend();
    assert!(matches!(backend, sea_orm::DatabaseBackend::Sqlite));
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let result = migrate(&db).await;
    assert!(result.is_ok());

    // Running twice is a no-op
    assert!(migrate(&db).await.is_ok());
}

#[tokio::test]
async fn test_task_status_round_trip() {
    let db = setup_test_db().await;

    let inserted = new_task(&["a.example.com", "b.example.com"])
        .insert(&db)
        .await
        .expect("Failed to insert task");
    assert_eq!(inserted.status, TaskStatus::Pending);
    assert_eq!(
        inserted.decode_domains(),
        vec!["a.example.com".to_string(), "b.example.com".to_string()]
    );

    let lease = Utc::now() + Duration::hours(2);
    let mut active: acme_task::ActiveModel = inserted.into();
    active.status = Set(TaskStatus::Running);
    active.running_lease_until = Set(Some(lease));
    let updated = active.update(&db).await.expect("Failed to update task");

    let found = acme_task::Entity::find_by_id(updated.id)
        .one(&db)
        .await
        .unwrap()
        .expect("Task should exist");
    assert_eq!(found.status, TaskStatus::Running);
    assert!(found.running_lease_until.is_some());
    assert_eq!(found.cert_id, None);
}

#[tokio::test]
async fn test_task_logs_relation() {
    let db = setup_test_db().await;

    let task = new_task(&["logs.example.com"]).insert(&db).await.unwrap();

    for (is_ok, error) in [(false, "dns: timeout"), (true, "")] {
        acme_task_log::ActiveModel {
            task_id: Set(task.id),
            is_ok: Set(is_ok),
            error: Set(error.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
    }

    let logs = task
        .find_related(acme_task_log::Entity)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs.iter().filter(|log| log.is_ok).count(), 1);
}

#[tokio::test]
async fn test_auth_url_blank_is_absent() {
    let db = setup_test_db().await;

    let mut task = new_task(&["blank.example.com"]);
    task.auth_url = Set(Some("   ".to_string()));
    let task = task.insert(&db).await.unwrap();

    assert_eq!(task.auth_url(), None);
}

#[tokio::test]
async fn test_server_https_and_policy_refs() {
    let db = setup_test_db().await;
    let now = Utc::now();

    let policy = ssl_policy::ActiveModel {
        admin_id: Set(1),
        user_id: Set(0),
        is_on: Set(true),
        state: Set(STATE_ENABLED),
        certs: Set(serde_json::to_string(&vec![SslCertRef::enabled(3)]).unwrap()),
        client_ca_certs: Set(None),
        client_auth_type: Set(0),
        min_version: Set("TLS 1.1".to_string()),
        cipher_suites_is_on: Set(false),
        cipher_suites: Set(None),
        hsts: Set(None),
        http2_enabled: Set(true),
        http3_enabled: Set(false),
        ocsp_is_on: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();
    assert_eq!(policy.decode_cert_refs(), vec![SslCertRef::enabled(3)]);

    let https = format!(
        r#"{{"isOn":true,"listen":[{{"portRange":"443"}}],"sslPolicyRef":{{"isOn":true,"sslPolicyId":{}}}}}"#,
        policy.id
    );
    server::ActiveModel {
        admin_id: Set(1),
        user_id: Set(0),
        name: Set("site".to_string()),
        server_names: Set(encode_string_list(&["www.example.com".to_string()])),
        https: Set(Some(https)),
        is_on: Set(true),
        state: Set(STATE_ENABLED),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let found = server::Entity::find()
        .filter(server::Column::State.eq(STATE_ENABLED))
        .one(&db)
        .await
        .unwrap()
        .expect("Server should exist");
    let config = found.decode_https().expect("HTTPS config should decode");
    assert_eq!(config.ssl_policy_id(), Some(policy.id));
    assert_eq!(found.decode_server_names(), vec!["www.example.com".to_string()]);
}
