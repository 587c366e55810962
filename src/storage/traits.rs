//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{ProfessionRecord, SessionRecord, SkillCount, StatRecord};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Profession not found: {0}")]
    ProfessionNotFound(String),

    #[error("Scraping session not found: {0}")]
    SessionNotFound(String),

    #[error("No statistics recorded for profession: {0}")]
    StatisticsNotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Which skill table a collection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkillKind {
    /// Tags attached to vacancies by the upstream
    Formal,
    /// Phrases found in vacancy descriptions
    Extracted,
}

impl SkillKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Formal => "formal_skills",
            Self::Extracted => "extracted_skills",
        }
    }
}

/// Trait for storage backend implementations
///
/// All statistics written during one run are keyed by that run's session id.
pub trait Storage {
    // ===== Profession Management =====

    /// Inserts a profession or updates the query and active flag of the one
    /// with the same name
    ///
    /// # Returns
    ///
    /// The profession ID (either newly created or existing)
    fn upsert_profession(&mut self, name: &str, query: &str, active: bool) -> StorageResult<i64>;

    /// Gets a profession by ID
    fn get_profession(&self, profession_id: i64) -> StorageResult<ProfessionRecord>;

    /// Gets all professions ordered by name
    fn list_professions(&self) -> StorageResult<Vec<ProfessionRecord>>;

    /// Gets the professions a run should process
    fn list_active_professions(&self) -> StorageResult<Vec<ProfessionRecord>>;

    /// Enables or disables a profession
    fn set_profession_active(&mut self, profession_id: i64, active: bool) -> StorageResult<()>;

    // ===== Session Management =====

    /// Creates a new scraping session stamped with the config hash
    fn create_session(&mut self, config_hash: &str) -> StorageResult<SessionRecord>;

    /// Gets a session by ID
    fn get_session(&self, session_id: Uuid) -> StorageResult<SessionRecord>;

    /// Gets the most recent session
    fn latest_session(&self) -> StorageResult<Option<SessionRecord>>;

    /// Gets all sessions, newest first
    fn list_sessions(&self) -> StorageResult<Vec<SessionRecord>>;

    // ===== Statistics =====

    /// Records the vacancy count for a profession in a session
    fn save_stat(
        &mut self,
        session_id: Uuid,
        profession_id: i64,
        vacancy_count: u64,
    ) -> StorageResult<()>;

    /// Records a skill collection for a profession in a session
    ///
    /// Only observed skills are stored; an empty collection writes no rows.
    fn save_skills(
        &mut self,
        kind: SkillKind,
        session_id: Uuid,
        profession_id: i64,
        skills: &HashMap<String, u32>,
    ) -> StorageResult<()>;

    /// Records formal skill counts
    fn save_formal_skills(
        &mut self,
        session_id: Uuid,
        profession_id: i64,
        skills: &HashMap<String, u32>,
    ) -> StorageResult<()> {
        self.save_skills(SkillKind::Formal, session_id, profession_id, skills)
    }

    /// Records extracted skill counts
    fn save_extracted_skills(
        &mut self,
        session_id: Uuid,
        profession_id: i64,
        skills: &HashMap<String, u32>,
    ) -> StorageResult<()> {
        self.save_skills(SkillKind::Extracted, session_id, profession_id, skills)
    }

    /// Gets the vacancy count for a profession in a session
    fn get_stat(&self, session_id: Uuid, profession_id: i64) -> StorageResult<Option<StatRecord>>;

    /// Gets the most recently recorded vacancy count for a profession
    fn latest_stat(&self, profession_id: i64) -> StorageResult<Option<StatRecord>>;

    /// Gets all vacancy counts recorded in a session
    fn get_session_stats(&self, session_id: Uuid) -> StorageResult<Vec<StatRecord>>;

    /// Gets a skill collection, sorted by descending count
    fn get_skills(
        &self,
        kind: SkillKind,
        session_id: Uuid,
        profession_id: i64,
    ) -> StorageResult<Vec<SkillCount>>;

    /// Gets formal skill counts, sorted by descending count
    fn get_formal_skills(
        &self,
        session_id: Uuid,
        profession_id: i64,
    ) -> StorageResult<Vec<SkillCount>> {
        self.get_skills(SkillKind::Formal, session_id, profession_id)
    }

    /// Gets extracted skill counts, sorted by descending count
    fn get_extracted_skills(
        &self,
        session_id: Uuid,
        profession_id: i64,
    ) -> StorageResult<Vec<SkillCount>> {
        self.get_skills(SkillKind::Extracted, session_id, profession_id)
    }
}
