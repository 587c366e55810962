//! Read-through cache for per-profession statistics
//!
//! Detail views are served from the cache when a fresh entry exists and
//! assembled from storage otherwise. Writes happen off the request path
//! through a [`CacheWriter`], so a slow or failing cache never delays a run.

mod memory;
mod sqlite;
mod writer;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use writer::{CacheWorker, CacheWriter, WriterStats};

use crate::storage::SkillCount;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Cached view of a profession's latest statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionDetail {
    pub profession_id: i64,
    pub name: String,
    pub vacancy_count: u64,
    pub formal_skills: Vec<SkillCount>,
    pub extracted_skills: Vec<SkillCount>,
    pub session_id: Uuid,
    pub scraped_at: String,
}

/// Key under which a profession's detail is stored
pub fn detail_key(profession_id: i64) -> String {
    format!("profession:{}:skills", profession_id)
}

/// Backend holding serialized profession details with an expiry
#[async_trait]
pub trait DetailCache: Send + Sync {
    /// Returns the entry for a profession unless it is missing or expired
    async fn load(&self, profession_id: i64) -> Result<Option<ProfessionDetail>>;

    /// Stores an entry, replacing any previous one
    async fn save(&self, detail: &ProfessionDetail, ttl: Duration) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) fn sample_detail(profession_id: i64) -> ProfessionDetail {
    ProfessionDetail {
        profession_id,
        name: format!("profession-{}", profession_id),
        vacancy_count: 2,
        formal_skills: vec![SkillCount::new("rust", 2)],
        extracted_skills: vec![SkillCount::new("tokio", 1)],
        session_id: Uuid::new_v4(),
        scraped_at: "2024-01-01T00:00:00+00:00".to_string(),
    }
}
