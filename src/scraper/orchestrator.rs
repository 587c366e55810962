//! Run orchestration
//!
//! A run loads the active professions, opens a scraping session, harvests
//! each profession under its own time box, and writes the resulting
//! statistics. Only the profession list and session creation can fail the
//! run; everything else is absorbed into per-profession outcomes.

use crate::api::VacancyApi;
use crate::cache::{CacheWriter, ProfessionDetail};
use crate::scraper::aggregate::{
    extracted_skill_counts, formal_skill_counts, sorted_counts, SkillCounts,
};
use crate::scraper::harvest::{harvest_profession, ProfessionHarvest};
use crate::storage::{with_storage, ProfessionRecord, SessionRecord, SharedStorage};
use crate::{HarvestError, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Knobs of a run that do not belong to the upstream client
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Hard ceiling for one profession's harvest
    pub profession_timeout: Duration,
    /// Professions processed at the same time
    pub concurrency: usize,
    /// Stamped on persisted sessions
    pub config_hash: String,
}

/// How a profession's processing ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfessionStatus {
    Completed,
    NoResults,
    Failed(String),
    TimedOut,
    Cancelled,
}

impl ProfessionStatus {
    /// Whether statistics were produced for the profession
    pub fn has_statistics(&self) -> bool {
        matches!(self, Self::Completed | Self::NoResults)
    }
}

/// Per-profession result of a run
#[derive(Debug, Clone)]
pub struct ProfessionOutcome {
    pub profession_id: i64,
    pub name: String,
    pub status: ProfessionStatus,
    pub vacancy_count: u64,
    pub formal_skills: usize,
    pub extracted_skills: usize,
    pub pages_failed: usize,
    pub items_failed: usize,
    pub write_failures: usize,
}

impl ProfessionOutcome {
    fn new(profession: &ProfessionRecord, status: ProfessionStatus) -> Self {
        Self {
            profession_id: profession.id,
            name: profession.name.clone(),
            status,
            vacancy_count: 0,
            formal_skills: 0,
            extracted_skills: 0,
            pages_failed: 0,
            items_failed: 0,
            write_failures: 0,
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub session_id: Uuid,
    pub persisted: bool,
    pub outcomes: Vec<ProfessionOutcome>,
}

impl RunReport {
    pub fn count(&self, pred: impl Fn(&ProfessionStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|s| *s == ProfessionStatus::Completed)
    }

    pub fn total_vacancies(&self) -> u64 {
        self.outcomes.iter().map(|o| o.vacancy_count).sum()
    }
}

/// Drives harvest runs against a vacancy API
pub struct ScrapeOrchestrator {
    api: Arc<dyn VacancyApi>,
    storage: SharedStorage,
    cache: CacheWriter,
    settings: OrchestratorSettings,
}

impl ScrapeOrchestrator {
    pub fn new(
        api: Arc<dyn VacancyApi>,
        storage: SharedStorage,
        cache: CacheWriter,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            api,
            storage,
            cache,
            settings,
        }
    }

    /// Executes one run
    ///
    /// With `persist` false nothing is written to storage; a session id is
    /// synthesized so cache entries still carry one.
    ///
    /// # Errors
    ///
    /// Fails only if the active professions cannot be loaded or, when
    /// persisting, the session cannot be created.
    pub async fn run(&self, cancel: &CancellationToken, persist: bool) -> Result<RunReport> {
        let professions = with_storage(&self.storage, |s| s.list_active_professions())?;

        let session = if persist {
            with_storage(&self.storage, |s| s.create_session(&self.settings.config_hash))?
        } else {
            SessionRecord::synthetic(&self.settings.config_hash)
        };

        tracing::info!(
            session_id = %session.id,
            professions = professions.len(),
            persist,
            "Starting scrape run"
        );
        let started = std::time::Instant::now();

        let outcomes = Mutex::new(Vec::with_capacity(professions.len()));
        stream::iter(professions.iter())
            .for_each_concurrent(self.settings.concurrency.max(1), |profession| {
                let outcomes = &outcomes;
                let session = &session;
                async move {
                    let outcome = self
                        .process_profession(cancel, profession, session, persist)
                        .await;
                    outcomes.lock().await.push(outcome);
                }
            })
            .await;

        let mut outcomes = outcomes.into_inner();
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));

        let report = RunReport {
            session_id: session.id,
            persisted: persist,
            outcomes,
        };

        tracing::info!(
            "Scrape run {} finished in {:?}: {}/{} professions completed, {} vacancies",
            report.session_id,
            started.elapsed(),
            report.completed(),
            report.outcomes.len(),
            report.total_vacancies()
        );

        Ok(report)
    }

    async fn process_profession(
        &self,
        cancel: &CancellationToken,
        profession: &ProfessionRecord,
        session: &SessionRecord,
        persist: bool,
    ) -> ProfessionOutcome {
        if cancel.is_cancelled() {
            return ProfessionOutcome::new(profession, ProfessionStatus::Cancelled);
        }

        tracing::info!(
            profession = %profession.name,
            query = %profession.query,
            "Harvesting profession"
        );

        let harvest = tokio::time::timeout(
            self.settings.profession_timeout,
            harvest_profession(self.api.as_ref(), cancel, &profession.query),
        )
        .await;

        let (status, harvest) = match harvest {
            Ok(Ok(harvest)) => {
                log_partial_failures(profession, &harvest);
                (ProfessionStatus::Completed, harvest)
            }
            Ok(Err(HarvestError::NoResults { .. })) => {
                tracing::warn!(profession = %profession.name, "No vacancies found");
                (ProfessionStatus::NoResults, ProfessionHarvest::default())
            }
            Ok(Err(HarvestError::Cancelled)) => {
                tracing::warn!(profession = %profession.name, "Harvest cancelled");
                return ProfessionOutcome::new(profession, ProfessionStatus::Cancelled);
            }
            Ok(Err(e)) => {
                tracing::warn!(profession = %profession.name, error = %e, "Harvest failed");
                return ProfessionOutcome::new(profession, ProfessionStatus::Failed(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    profession = %profession.name,
                    timeout = ?self.settings.profession_timeout,
                    "Harvest timed out"
                );
                return ProfessionOutcome::new(profession, ProfessionStatus::TimedOut);
            }
        };

        let formal = formal_skill_counts(&harvest.records);
        let extracted = extracted_skill_counts(&harvest.records, &formal);
        let vacancy_count = harvest.records.len() as u64;

        let mut outcome = ProfessionOutcome::new(profession, status);
        outcome.vacancy_count = vacancy_count;
        outcome.formal_skills = formal.len();
        outcome.extracted_skills = extracted.len();
        outcome.pages_failed = harvest.page_failures.len();
        outcome.items_failed = harvest.item_failures.len();

        if persist {
            outcome.write_failures =
                self.persist_statistics(session, profession, vacancy_count, &formal, &extracted);
        }

        self.cache.submit(ProfessionDetail {
            profession_id: profession.id,
            name: profession.name.clone(),
            vacancy_count,
            formal_skills: sorted_counts(&formal),
            extracted_skills: sorted_counts(&extracted),
            session_id: session.id,
            scraped_at: session.created_at.clone(),
        });

        tracing::info!(
            profession = %profession.name,
            vacancies = vacancy_count,
            formal = outcome.formal_skills,
            extracted = outcome.extracted_skills,
            "Profession processed"
        );

        outcome
    }

    /// Writes the three statistics independently, returning how many failed
    fn persist_statistics(
        &self,
        session: &SessionRecord,
        profession: &ProfessionRecord,
        vacancy_count: u64,
        formal: &SkillCounts,
        extracted: &SkillCounts,
    ) -> usize {
        let writes = [
            (
                "stat",
                with_storage(&self.storage, |s| {
                    s.save_stat(session.id, profession.id, vacancy_count)
                }),
            ),
            (
                "formal skills",
                with_storage(&self.storage, |s| {
                    s.save_formal_skills(session.id, profession.id, formal)
                }),
            ),
            (
                "extracted skills",
                with_storage(&self.storage, |s| {
                    s.save_extracted_skills(session.id, profession.id, extracted)
                }),
            ),
        ];

        let mut failures = 0;
        for (what, result) in writes {
            if let Err(e) = result {
                failures += 1;
                tracing::error!(
                    profession = %profession.name,
                    session_id = %session.id,
                    error = %e,
                    "Failed to save {}",
                    what
                );
            }
        }
        failures
    }
}

fn log_partial_failures(profession: &ProfessionRecord, harvest: &ProfessionHarvest) {
    for failure in harvest.page_failures.iter().chain(&harvest.item_failures) {
        tracing::warn!(
            profession = %profession.name,
            error = %failure.error,
            "Skipping {}",
            failure.label
        );
    }
}
