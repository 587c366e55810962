//! Shared fixtures for the integration tests

use serde_json::json;
use skill_harvester::api::{
    build_http_client, AccessTokenManager, RetryPolicy, RetryingFetcher, TokenConfig,
    VacancyClient,
};
use skill_harvester::cache::{CacheWorker, CacheWriter, SqliteCache};
use skill_harvester::config::{parse_config, validate, Config};
use skill_harvester::scraper::{OrchestratorSettings, ProfessionOutcome, RunReport};
use skill_harvester::storage::{seed_professions, share, SharedStorage, SqliteStorage};
use skill_harvester::ScrapeOrchestrator;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const FRESH_TOKEN: &str = "fresh-token";

/// Builds a validated config pointing at the mock server
pub fn test_config(
    server: &MockServer,
    db_path: &Path,
    access_token: Option<&str>,
    professions: &[(&str, &str)],
) -> Config {
    let uri = server.uri();
    let token_line = access_token
        .map(|t| format!("access-token = \"{}\"", t))
        .unwrap_or_default();

    let mut toml = format!(
        r#"
[api]
base-url = "{uri}"
token-url = "{uri}/token"
client-id = "client"
client-secret = "secret"
user-agent = "skill-harvester-tests/1.0"
page-size = 2
{token_line}

[rate-limit]
capacity = 100
refill-per-second = 100

[retry]
max-attempts = 3
initial-delay-ms = 10
max-delay-ms = 50
max-total-time-ms = 5000

[scraper]
profession-timeout-secs = 30
token-min-refresh-secs = 0

[output]
database-path = "{db}"
"#,
        uri = uri,
        token_line = token_line,
        db = db_path.display()
    );

    for (name, query) in professions {
        toml.push_str(&format!(
            "\n[[profession]]\nname = \"{}\"\nquery = \"{}\"\n",
            name, query
        ));
    }

    let config = parse_config(&toml).unwrap();
    validate(&config).unwrap();
    config
}

/// Everything a test needs to drive and inspect a run
pub struct Pipeline {
    pub orchestrator: ScrapeOrchestrator,
    pub storage: SharedStorage,
    pub cache: Arc<SqliteCache>,
    pub worker: CacheWorker,
    pub tokens: Arc<AccessTokenManager>,
    pub profession_ids: Vec<i64>,
    pub db_path: std::path::PathBuf,
    _dir: TempDir,
}

/// Wires the pipeline the way the binary does
pub fn build_pipeline(
    server: &MockServer,
    access_token: Option<&str>,
    professions: &[(&str, &str)],
) -> Pipeline {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("skills.db");
    let config = test_config(server, &db_path, access_token, professions);

    let mut storage = SqliteStorage::new(&db_path).unwrap();
    let profession_ids = seed_professions(&mut storage, &config.professions).unwrap();
    let storage = share(storage);

    let http = build_http_client(&config.api.user_agent).unwrap();
    let tokens = Arc::new(AccessTokenManager::new(
        http.clone(),
        TokenConfig {
            token_url: config.api.token_url.clone(),
            client_id: config.api.client_id.clone(),
            client_secret: config.api.client_secret.clone(),
            min_refresh_interval: config.scraper.token_min_refresh(),
            initial_token: config.api.access_token.clone(),
        },
    ));
    let fetcher = RetryingFetcher::new(
        http,
        tokens.clone(),
        &config.rate_limit,
        RetryPolicy::from_config(&config.retry),
        &config.api.user_agent,
    )
    .unwrap();
    let client = VacancyClient::new(fetcher, &config.api).unwrap();

    let cache = Arc::new(SqliteCache::open(&db_path).unwrap());
    let (writer, worker) = CacheWriter::spawn(
        cache.clone(),
        config.cache.expiry(),
        config.cache.write_timeout(),
        config.cache.queue_capacity,
    );

    let orchestrator = ScrapeOrchestrator::new(
        Arc::new(client),
        storage.clone(),
        writer,
        OrchestratorSettings {
            profession_timeout: config.scraper.profession_timeout(),
            concurrency: 1,
            config_hash: "integration".to_string(),
        },
    );

    Pipeline {
        orchestrator,
        storage,
        cache,
        worker,
        tokens,
        profession_ids,
        db_path,
        _dir: dir,
    }
}

/// Mounts a token endpoint issuing `token`
pub async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
        .mount(server)
        .await;
}

/// Mounts a query whose vacancies are listed two per page
///
/// Each vacancy is `(id, description, skills)`.
pub async fn mount_query(
    server: &MockServer,
    token: &str,
    query: &str,
    vacancies: &[(&str, &str, &[&str])],
) {
    let found = vacancies.len();
    let pages = found.div_ceil(2).max(1);
    let bearer = format!("Bearer {}", token);

    for page in 0..pages {
        let items: Vec<_> = vacancies
            .iter()
            .skip(page * 2)
            .take(2)
            .map(|(id, _, _)| json!({ "id": id }))
            .collect();

        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .and(query_param("text", query))
            .and(query_param("page", page.to_string()))
            .and(header("Authorization", bearer.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": found,
                "pages": pages,
                "items": items,
            })))
            .mount(server)
            .await;
    }

    for (id, description, skills) in vacancies {
        let key_skills: Vec<_> = skills.iter().map(|s| json!({ "name": s })).collect();
        Mock::given(method("GET"))
            .and(path(format!("/vacancies/{}", id)))
            .and(header("Authorization", bearer.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "description": description,
                "key_skills": key_skills,
            })))
            .mount(server)
            .await;
    }
}

pub fn outcome<'a>(report: &'a RunReport, name: &str) -> &'a ProfessionOutcome {
    report
        .outcomes
        .iter()
        .find(|o| o.name == name)
        .unwrap_or_else(|| panic!("no outcome for {}", name))
}
