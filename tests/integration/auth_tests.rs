//! Token handling across the pipeline

use crate::common::{build_pipeline, mount_query, mount_token, outcome, FRESH_TOKEN};
use skill_harvester::storage::{SqliteStorage, Storage};
use skill_harvester::ProfessionStatus;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VACANCIES: &[(&str, &str, &[&str])] = &[
    ("1", "Go and Kubernetes", &["Go", "Kubernetes"]),
    ("2", "Plain Go", &["Go"]),
];

#[tokio::test]
async fn test_forbidden_token_is_replaced() {
    let server = MockServer::start().await;

    Mock::given(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": FRESH_TOKEN })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_query(&server, FRESH_TOKEN, "golang", VACANCIES).await;

    let pipeline = build_pipeline(&server, Some("stale-token"), &[("Go developer", "golang")]);
    let go = pipeline.profession_ids[0];

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    let o = outcome(&report, "Go developer");
    assert_eq!(o.status, ProfessionStatus::Completed);
    assert_eq!(o.vacancy_count, 2);
    assert_eq!(pipeline.tokens.refresh_count(), 1);

    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    let stat = storage.get_stat(report.session_id, go).unwrap().unwrap();
    assert_eq!(stat.vacancy_count, 2);
}

#[tokio::test]
async fn test_pre_issued_token_is_used_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_query(&server, "issued", "golang", VACANCIES).await;

    let pipeline = build_pipeline(&server, Some("issued"), &[("Go developer", "golang")]);

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), false)
        .await
        .unwrap();

    assert_eq!(outcome(&report, "Go developer").vacancy_count, 2);
    assert_eq!(pipeline.tokens.refresh_count(), 0);
}

#[tokio::test]
async fn test_token_endpoint_failure_fails_profession_not_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let pipeline = build_pipeline(&server, None, &[("Go developer", "golang")]);
    let go = pipeline.profession_ids[0];

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    match &outcome(&report, "Go developer").status {
        ProfessionStatus::Failed(reason) => assert!(reason.contains("Authorization")),
        other => panic!("unexpected status {:?}", other),
    }

    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    assert!(storage.get_session(report.session_id).is_ok());
    assert!(storage.get_stat(report.session_id, go).unwrap().is_none());
}

#[tokio::test]
async fn test_token_shared_across_professions() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;
    mount_query(&server, FRESH_TOKEN, "golang", VACANCIES).await;
    mount_query(&server, FRESH_TOKEN, "rust", VACANCIES).await;

    let pipeline = build_pipeline(
        &server,
        None,
        &[("Go developer", "golang"), ("Rust developer", "rust")],
    );

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    assert_eq!(report.completed(), 2);
    assert_eq!(pipeline.tokens.refresh_count(), 1);
}
