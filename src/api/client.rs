//! Typed client for the vacancy-search API
//!
//! Three request shapes are issued, all through the [`RetryingFetcher`]:
//! - `GET /vacancies?text=..&page=0` for the result count
//! - `GET /vacancies?text=..&page=k` for the vacancy ids on page `k`
//! - `GET /vacancies/{id}` for a single vacancy's description and key skills

use crate::api::fetcher::{FetchRequest, FetchResponse, RetryingFetcher};
use crate::api::VacancyApi;
use crate::config::ApiConfig;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result-count metadata for a search query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SearchMeta {
    #[serde(default)]
    pub found: u64,
    #[serde(default)]
    pub pages: u64,
}

/// A single vacancy as needed for skill counting
///
/// Lives only while its profession is being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VacancyRecord {
    /// Free-text description (may contain HTML markup)
    pub description: String,

    /// Formal skill tags, lower-cased
    pub skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    items: Vec<ItemRef>,
}

#[derive(Debug, Deserialize)]
struct ItemRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VacancyResponse {
    #[serde(default)]
    description: String,
    #[serde(default)]
    key_skills: Vec<KeySkill>,
}

#[derive(Debug, Deserialize)]
struct KeySkill {
    name: String,
}

/// Builds the HTTP client shared by the token manager and the fetcher
pub fn build_http_client(user_agent: &str) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Number of listing pages needed to cover `meta.found` results
///
/// `ceil(found / page_size)`, never more than the upstream says it serves
/// when it reports a page count.
pub fn page_count(meta: &SearchMeta, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    let needed = meta.found.div_ceil(page_size);

    if meta.pages > 0 {
        needed.min(meta.pages)
    } else {
        needed
    }
}

/// Vacancy-search API client
pub struct VacancyClient {
    fetcher: RetryingFetcher,
    vacancies_url: Url,
    area: String,
    page_size: u32,
}

impl VacancyClient {
    /// Creates a client for the API rooted at `config.base_url`
    pub fn new(fetcher: RetryingFetcher, config: &ApiConfig) -> Result<Self> {
        let mut vacancies_url = Url::parse(&config.base_url)?;
        vacancies_url
            .path_segments_mut()
            .map_err(|_| {
                HarvestError::InvalidInput(format!(
                    "base-url '{}' cannot carry a path",
                    config.base_url
                ))
            })?
            .pop_if_empty()
            .push("vacancies");

        Ok(Self {
            fetcher,
            vacancies_url,
            area: config.area.clone(),
            page_size: config.page_size,
        })
    }

    fn search_request(&self, query: &str, page: u64) -> FetchRequest {
        FetchRequest::get(self.vacancies_url.clone())
            .query("text", query)
            .query("search_field", "name")
            .query("per_page", self.page_size)
            .query("page", page)
            .query("area", &self.area)
    }

    fn vacancy_url(&self, id: &str) -> Url {
        let mut url = self.vacancies_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }
}

#[async_trait]
impl VacancyApi for VacancyClient {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch_meta(&self, cancel: &CancellationToken, query: &str) -> Result<SearchMeta> {
        let response = self
            .fetcher
            .fetch(cancel, &self.search_request(query, 0))
            .await?;
        let meta: SearchMeta = decode(&response)?;

        if meta.found == 0 {
            return Err(HarvestError::NoResults {
                query: query.to_string(),
            });
        }

        Ok(meta)
    }

    async fn fetch_page_ids(
        &self,
        cancel: &CancellationToken,
        query: &str,
        page: u64,
    ) -> Result<Vec<String>> {
        let response = self
            .fetcher
            .fetch(cancel, &self.search_request(query, page))
            .await?;
        let page: PageResponse = decode(&response)?;

        Ok(page.items.into_iter().map(|item| item.id).collect())
    }

    async fn fetch_vacancy(&self, cancel: &CancellationToken, id: &str) -> Result<VacancyRecord> {
        let request = FetchRequest::get(self.vacancy_url(id));
        let response = self.fetcher.fetch(cancel, &request).await?;
        let vacancy: VacancyResponse = decode(&response)?;

        Ok(VacancyRecord {
            description: vacancy.description,
            skills: vacancy
                .key_skills
                .into_iter()
                .map(|skill| skill.name.to_lowercase())
                .collect(),
        })
    }
}

fn decode<T: DeserializeOwned>(response: &FetchResponse) -> Result<T> {
    serde_json::from_str(&response.body).map_err(|source| HarvestError::Decode {
        url: response.url.clone(),
        source,
    })
}
