//! Storage module for persisting harvest statistics
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Profession bookkeeping
//! - Scraping session tracking
//! - Per-session vacancy counts and skill collections

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{SkillKind, Storage, StorageError, StorageResult};

use crate::config::ProfessionEntry;
use crate::HarvestError;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Storage handle shared between the orchestrator and the reporting paths
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend so it can be shared across tasks
pub fn share<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Runs a closure against the shared storage, holding the lock only for its duration
pub fn with_storage<T>(
    storage: &SharedStorage,
    f: impl FnOnce(&mut (dyn Storage + Send)) -> StorageResult<T>,
) -> StorageResult<T> {
    let mut guard = storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
    f(&mut *guard)
}

/// Makes the configured professions the stored ones
///
/// Entries are upserted by name. Stored professions missing from the list
/// are deactivated, not deleted, so their history stays queryable.
///
/// # Returns
///
/// The ids of the configured professions, in list order
pub fn seed_professions<S: Storage + ?Sized>(
    storage: &mut S,
    entries: &[ProfessionEntry],
) -> StorageResult<Vec<i64>> {
    let mut configured = Vec::with_capacity(entries.len());
    for entry in entries {
        configured.push(storage.upsert_profession(&entry.name, &entry.query, entry.active)?);
    }

    for profession in storage.list_professions()? {
        if profession.active && !configured.contains(&profession.id) {
            tracing::info!("Deactivating profession {} (not in config)", profession.name);
            storage.set_profession_active(profession.id, false)?;
        }
    }

    Ok(configured)
}

/// A tracked profession
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionRecord {
    pub id: i64,
    pub name: String,
    pub query: String,
    pub active: bool,
}

/// A scraping session; every statistic written during a run carries its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub created_at: String,
    pub config_hash: String,
}

impl SessionRecord {
    /// Builds a session that only exists in memory, used by dry runs
    pub fn synthetic(config_hash: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now().to_rfc3339(),
            config_hash: config_hash.to_string(),
        }
    }
}

/// Vacancy count for a profession in a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    pub session_id: Uuid,
    pub profession_id: i64,
    pub vacancy_count: u64,
}

/// A skill together with the number of times it was observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCount {
    pub skill: String,
    pub count: u32,
}

impl SkillCount {
    pub fn new(skill: impl Into<String>, count: u32) -> Self {
        Self {
            skill: skill.into(),
            count,
        }
    }
}
