//! In-process cache backend

use crate::cache::{detail_key, DetailCache, ProfessionDetail};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    detail: ProfessionDetail,
    expires_at: Instant,
}

/// Cache kept in a map; entries vanish with the process
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DetailCache for MemoryCache {
    async fn load(&self, profession_id: i64) -> Result<Option<ProfessionDetail>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| crate::HarvestError::Cache("memory cache lock poisoned".into()))?;
        let key = detail_key(profession_id);

        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.detail.clone())),
            Some(_) => {
                entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, detail: &ProfessionDetail, ttl: Duration) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| crate::HarvestError::Cache("memory cache lock poisoned".into()))?;
        entries.insert(
            detail_key(detail.profession_id),
            Entry {
                detail: detail.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
