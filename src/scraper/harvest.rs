//! Three-stage harvest of a single profession
//!
//! 1. Metadata: how many vacancies match the query.
//! 2. Listing pages: vacancy ids, one request per page.
//! 3. Details: description and tags, one request per vacancy.
//!
//! Stages 2 and 3 tolerate individual failures.

use crate::api::{page_count, VacancyApi, VacancyRecord};
use crate::scraper::collect::{collect_partial, Failure};
use crate::Result;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything gathered for one profession
#[derive(Debug, Default)]
pub struct ProfessionHarvest {
    /// Total matches reported by the upstream
    pub found: u64,
    /// Listing pages requested
    pub pages: u64,
    /// Vacancies whose details were fetched
    pub records: Vec<VacancyRecord>,
    pub page_failures: Vec<Failure>,
    pub item_failures: Vec<Failure>,
}

/// Runs the three stages for `query`
///
/// # Errors
///
/// * `HarvestError::NoResults` - the upstream reported zero matches
/// * `HarvestError::Cancelled` - the run was cancelled mid-harvest
/// * any metadata fetch failure, which leaves nothing to harvest
pub async fn harvest_profession(
    api: &dyn VacancyApi,
    cancel: &CancellationToken,
    query: &str,
) -> Result<ProfessionHarvest> {
    let meta = api.fetch_meta(cancel, query).await?;
    let pages = page_count(&meta, api.page_size());
    debug!(query, found = meta.found, pages, "Fetched search metadata");

    let ids = collect_partial(
        (0..pages).map(|page| (format!("page {}", page), api.fetch_page_ids(cancel, query, page))),
    )
    .await?
    .flatten();
    debug!(query, ids = ids.items.len(), "Collected vacancy ids");

    let details = collect_partial(
        ids.items
            .iter()
            .map(|id| (format!("vacancy {}", id), api.fetch_vacancy(cancel, id))),
    )
    .await?;

    Ok(ProfessionHarvest {
        found: meta.found,
        pages,
        records: details.items,
        page_failures: ids.failures,
        item_failures: details.failures,
    })
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::api::SearchMeta;
    use crate::HarvestError;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted upstream keyed by query and vacancy id
    #[derive(Default)]
    pub struct FakeApi {
        pub page_size: u32,
        pub found: HashMap<String, u64>,
        pub pages: HashMap<(String, u64), Vec<String>>,
        pub vacancies: HashMap<String, VacancyRecord>,
        pub failing_meta: HashSet<String>,
        pub failing_pages: HashSet<(String, u64)>,
        pub stall_queries: HashSet<String>,
        pub requests: AtomicUsize,
    }

    impl FakeApi {
        pub fn new(page_size: u32) -> Self {
            Self {
                page_size,
                ..Default::default()
            }
        }

        /// Registers a query whose vacancies are spread over pages of `page_size`
        pub fn with_query(mut self, query: &str, vacancies: Vec<(&str, VacancyRecord)>) -> Self {
            self.found.insert(query.to_string(), vacancies.len() as u64);
            for (index, chunk) in vacancies.chunks(self.page_size as usize).enumerate() {
                self.pages.insert(
                    (query.to_string(), index as u64),
                    chunk.iter().map(|(id, _)| id.to_string()).collect(),
                );
            }
            for (id, record) in vacancies {
                self.vacancies.insert(id.to_string(), record);
            }
            self
        }

        pub fn without_vacancy(mut self, id: &str) -> Self {
            self.vacancies.remove(id);
            self
        }

        fn failure(what: &str) -> HarvestError {
            HarvestError::FetchFailed {
                url: what.to_string(),
                status: Some(500),
                cause: "scripted failure".to_string(),
            }
        }
    }

    pub fn record(description: &str, skills: &[&str]) -> VacancyRecord {
        VacancyRecord {
            description: description.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[async_trait]
    impl VacancyApi for FakeApi {
        fn page_size(&self) -> u32 {
            self.page_size
        }

        async fn fetch_meta(&self, cancel: &CancellationToken, query: &str) -> Result<SearchMeta> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.stall_queries.contains(query) {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
                }
            }
            if self.failing_meta.contains(query) {
                return Err(Self::failure(query));
            }
            match self.found.get(query) {
                Some(0) | None => Err(HarvestError::NoResults {
                    query: query.to_string(),
                }),
                Some(found) => Ok(SearchMeta {
                    found: *found,
                    pages: 0,
                }),
            }
        }

        async fn fetch_page_ids(
            &self,
            cancel: &CancellationToken,
            query: &str,
            page: u64,
        ) -> Result<Vec<String>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }
            let key = (query.to_string(), page);
            if self.failing_pages.contains(&key) {
                return Err(Self::failure(&format!("{} page {}", query, page)));
            }
            Ok(self.pages.get(&key).cloned().unwrap_or_default())
        }

        async fn fetch_vacancy(
            &self,
            cancel: &CancellationToken,
            id: &str,
        ) -> Result<VacancyRecord> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }
            self.vacancies
                .get(id)
                .cloned()
                .ok_or_else(|| Self::failure(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{record, FakeApi};
    use super::*;
    use crate::HarvestError;

    #[tokio::test]
    async fn test_collects_all_pages() {
        let api = FakeApi::new(2).with_query(
            "rust",
            vec![
                ("1", record("a", &["rust"])),
                ("2", record("b", &["git"])),
                ("3", record("c", &[])),
            ],
        );

        let harvest = harvest_profession(&api, &CancellationToken::new(), "rust")
            .await
            .unwrap();

        assert_eq!(harvest.found, 3);
        assert_eq!(harvest.pages, 2);
        assert_eq!(harvest.records.len(), 3);
        assert!(harvest.page_failures.is_empty());
        assert!(harvest.item_failures.is_empty());
    }

    #[tokio::test]
    async fn test_page_failure_keeps_other_pages() {
        let mut api = FakeApi::new(1).with_query(
            "rust",
            vec![("1", record("a", &[])), ("2", record("b", &[]))],
        );
        api.failing_pages.insert(("rust".to_string(), 0));

        let harvest = harvest_profession(&api, &CancellationToken::new(), "rust")
            .await
            .unwrap();

        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.page_failures.len(), 1);
        assert_eq!(harvest.page_failures[0].label, "page 0");
    }

    #[tokio::test]
    async fn test_item_failure_keeps_other_items() {
        let api = FakeApi::new(10)
            .with_query(
                "rust",
                vec![("1", record("a", &[])), ("2", record("b", &[]))],
            )
            .without_vacancy("2");

        let harvest = harvest_profession(&api, &CancellationToken::new(), "rust")
            .await
            .unwrap();

        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.item_failures[0].label, "vacancy 2");
    }

    #[tokio::test]
    async fn test_no_results_is_an_error() {
        let api = FakeApi::new(10);

        let result = harvest_profession(&api, &CancellationToken::new(), "cobol").await;

        assert!(matches!(result, Err(HarvestError::NoResults { .. })));
    }

    #[tokio::test]
    async fn test_metadata_failure_is_fatal_for_profession() {
        let mut api = FakeApi::new(10).with_query("rust", vec![("1", record("a", &[]))]);
        api.failing_meta.insert("rust".to_string());

        let result = harvest_profession(&api, &CancellationToken::new(), "rust").await;

        assert!(matches!(result, Err(HarvestError::FetchFailed { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_pages() {
        let api = FakeApi::new(10).with_query("rust", vec![("1", record("a", &[]))]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = harvest_profession(&api, &cancel, "rust").await;

        assert!(matches!(result, Err(HarvestError::Cancelled)));
    }
}
