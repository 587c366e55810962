//! End-to-end harvest runs

use crate::common::{build_pipeline, mount_query, mount_token, outcome, FRESH_TOKEN};
use skill_harvester::cache::DetailCache;
use skill_harvester::report::{load_latest_statistics, profession_detail};
use skill_harvester::storage::{SkillCount, SqliteStorage, Storage};
use skill_harvester::ProfessionStatus;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RUST_VACANCIES: &[(&str, &str, &[&str])] = &[
    ("101", "<p>Rust, Tokio and PostgreSQL.</p>", &["Rust", "PostgreSQL"]),
    ("102", "Backend in rust; some docker", &["Rust", "Docker"]),
    ("103", "", &["Git"]),
];

#[tokio::test]
async fn test_full_run_persists_statistics() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;
    mount_query(&server, FRESH_TOKEN, "rust", RUST_VACANCIES).await;

    let pipeline = build_pipeline(&server, None, &[("Rust developer", "rust")]);
    let rust = pipeline.profession_ids[0];

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    let o = outcome(&report, "Rust developer");
    assert_eq!(o.status, ProfessionStatus::Completed);
    assert_eq!(o.vacancy_count, 3);
    assert_eq!(o.pages_failed + o.items_failed + o.write_failures, 0);

    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    let stat = storage.get_stat(report.session_id, rust).unwrap().unwrap();
    assert_eq!(stat.vacancy_count, 3);

    let formal = storage.get_formal_skills(report.session_id, rust).unwrap();
    assert_eq!(formal[0], SkillCount::new("rust", 2));
    assert_eq!(formal.len(), 4);

    let extracted = storage.get_extracted_skills(report.session_id, rust).unwrap();
    assert_eq!(
        extracted,
        vec![
            SkillCount::new("rust", 2),
            SkillCount::new("docker", 1),
            SkillCount::new("postgresql", 1),
        ]
    );
    assert!(extracted
        .iter()
        .all(|e| formal.iter().any(|f| f.skill == e.skill)));

    let stats = load_latest_statistics(&storage).unwrap().unwrap();
    assert_eq!(stats.session.id, report.session_id);
    assert_eq!(stats.total_vacancies(), 3);
}

#[tokio::test]
async fn test_run_populates_cache() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;
    mount_query(&server, FRESH_TOKEN, "rust", RUST_VACANCIES).await;

    let pipeline = build_pipeline(&server, None, &[("Rust developer", "rust")]);
    let rust = pipeline.profession_ids[0];

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();
    let stats = pipeline.worker.shutdown(Duration::from_secs(5)).await;

    assert_eq!(stats.written(), 1);
    let cached = pipeline.cache.load(rust).await.unwrap().unwrap();
    assert_eq!(cached.session_id, report.session_id);
    assert_eq!(cached.vacancy_count, 3);

    let detail = profession_detail(&pipeline.storage, pipeline.cache.as_ref(), None, rust)
        .await
        .unwrap();
    assert_eq!(detail, cached);
}

#[tokio::test]
async fn test_dry_run_writes_no_rows() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;
    mount_query(&server, FRESH_TOKEN, "rust", RUST_VACANCIES).await;

    let pipeline = build_pipeline(&server, None, &[("Rust developer", "rust")]);
    let rust = pipeline.profession_ids[0];

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), false)
        .await
        .unwrap();
    pipeline.worker.shutdown(Duration::from_secs(5)).await;

    assert!(!report.persisted);
    assert_eq!(outcome(&report, "Rust developer").vacancy_count, 3);

    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    assert!(storage.list_sessions().unwrap().is_empty());
    assert!(storage.latest_stat(rust).unwrap().is_none());
    assert!(load_latest_statistics(&storage).unwrap().is_none());

    let cached = pipeline.cache.load(rust).await.unwrap().unwrap();
    assert_eq!(cached.session_id, report.session_id);
}

#[tokio::test]
async fn test_failing_vacancy_is_retried_then_skipped() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;

    Mock::given(method("GET"))
        .and(path("/vacancies/102"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_query(&server, FRESH_TOKEN, "rust", RUST_VACANCIES).await;

    let pipeline = build_pipeline(&server, None, &[("Rust developer", "rust")]);
    let rust = pipeline.profession_ids[0];

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    let o = outcome(&report, "Rust developer");
    assert_eq!(o.status, ProfessionStatus::Completed);
    assert_eq!(o.items_failed, 1);
    assert_eq!(o.vacancy_count, 2);

    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    let stat = storage.get_stat(report.session_id, rust).unwrap().unwrap();
    assert_eq!(stat.vacancy_count, 2);
    let formal = storage.get_formal_skills(report.session_id, rust).unwrap();
    assert!(formal.iter().all(|s| s.skill != "docker"));
}

#[tokio::test]
async fn test_failing_profession_does_not_stop_others() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;
    mount_query(&server, FRESH_TOKEN, "rust", RUST_VACANCIES).await;
    mount_query(&server, FRESH_TOKEN, "cobol", &[]).await;

    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .and(wiremock::matchers::query_param("text", "golang"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pipeline = build_pipeline(
        &server,
        None,
        &[
            ("Rust developer", "rust"),
            ("Cobol developer", "cobol"),
            ("Go developer", "golang"),
        ],
    );
    let cobol = pipeline.profession_ids[1];
    let go = pipeline.profession_ids[2];

    let report = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    assert_eq!(
        outcome(&report, "Rust developer").status,
        ProfessionStatus::Completed
    );
    assert_eq!(
        outcome(&report, "Cobol developer").status,
        ProfessionStatus::NoResults
    );
    assert!(matches!(
        outcome(&report, "Go developer").status,
        ProfessionStatus::Failed(_)
    ));

    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    let cobol_stat = storage.get_stat(report.session_id, cobol).unwrap().unwrap();
    assert_eq!(cobol_stat.vacancy_count, 0);
    assert!(storage.get_stat(report.session_id, go).unwrap().is_none());
}

#[tokio::test]
async fn test_consecutive_runs_use_distinct_sessions() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;
    mount_query(&server, FRESH_TOKEN, "rust", RUST_VACANCIES).await;

    let pipeline = build_pipeline(&server, None, &[("Rust developer", "rust")]);

    let first = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();
    let second = pipeline
        .orchestrator
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    assert_ne!(first.session_id, second.session_id);
    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    assert_eq!(storage.list_sessions().unwrap().len(), 2);
    assert_eq!(storage.get_session_stats(first.session_id).unwrap().len(), 1);
    assert_eq!(storage.get_session_stats(second.session_id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_writes_no_statistics() {
    let server = MockServer::start().await;
    mount_token(&server, FRESH_TOKEN).await;
    mount_query(&server, FRESH_TOKEN, "rust", RUST_VACANCIES).await;

    let pipeline = build_pipeline(&server, None, &[("Rust developer", "rust")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = pipeline.orchestrator.run(&cancel, true).await.unwrap();

    assert_eq!(
        outcome(&report, "Rust developer").status,
        ProfessionStatus::Cancelled
    );
    let storage = SqliteStorage::new(&pipeline.db_path).unwrap();
    assert!(storage
        .get_session_stats(report.session_id)
        .unwrap()
        .is_empty());
}
