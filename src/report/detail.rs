//! Read-through profession detail

use crate::cache::{CacheWriter, DetailCache, ProfessionDetail};
use crate::storage::{with_storage, SharedStorage, Storage, StorageError, StorageResult};
use crate::Result;

/// Builds a profession's detail from its most recently recorded statistics
pub fn assemble_detail<S: Storage + ?Sized>(
    storage: &S,
    profession_id: i64,
) -> StorageResult<ProfessionDetail> {
    let profession = storage.get_profession(profession_id)?;
    let stat = storage
        .latest_stat(profession_id)?
        .ok_or_else(|| StorageError::StatisticsNotFound(profession.name.clone()))?;
    let session = storage.get_session(stat.session_id)?;

    Ok(ProfessionDetail {
        profession_id,
        name: profession.name,
        vacancy_count: stat.vacancy_count,
        formal_skills: storage.get_formal_skills(session.id, profession_id)?,
        extracted_skills: storage.get_extracted_skills(session.id, profession_id)?,
        session_id: session.id,
        scraped_at: session.created_at,
    })
}

/// Returns a profession's detail, preferring a fresh cache entry
///
/// A cache miss or cache error falls back to storage; the assembled detail
/// is then handed to `writer` so the next lookup hits.
pub async fn profession_detail(
    storage: &SharedStorage,
    cache: &dyn DetailCache,
    writer: Option<&CacheWriter>,
    profession_id: i64,
) -> Result<ProfessionDetail> {
    match cache.load(profession_id).await {
        Ok(Some(detail)) => {
            tracing::debug!(profession_id, backend = cache.name(), "Cache hit");
            return Ok(detail);
        }
        Ok(None) => tracing::debug!(profession_id, "Cache miss"),
        Err(e) => tracing::warn!(profession_id, error = %e, "Cache read failed"),
    }

    let detail = with_storage(storage, |s| assemble_detail(&*s, profession_id))?;
    if let Some(writer) = writer {
        writer.submit(detail.clone());
    }
    Ok(detail)
}

/// Prints a detail view to stdout
pub fn print_detail(detail: &ProfessionDetail) {
    println!("=== {} ===\n", detail.name);
    println!("  Session: {} ({})", detail.session_id, detail.scraped_at);
    println!("  Vacancies: {}", detail.vacancy_count);
    println!();

    for (title, skills) in [
        ("Formal Skills", &detail.formal_skills),
        ("Extracted Skills", &detail.extracted_skills),
    ] {
        println!("{} ({}):", title, skills.len());
        for skill in skills {
            println!("  {:>5}  {}", skill.count, skill.skill);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{sample_detail, MemoryCache};
    use crate::storage::{share, SkillCount, SqliteStorage};
    use crate::HarvestError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn seeded() -> (SharedStorage, i64) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let id = storage.upsert_profession("Rust", "rust", true).unwrap();
        let old = storage.create_session("h").unwrap();
        storage.save_stat(old.id, id, 1).unwrap();
        let session = storage.create_session("h").unwrap();
        storage.save_stat(session.id, id, 4).unwrap();
        let skills: HashMap<String, u32> = [("rust".to_string(), 4), ("git".to_string(), 1)]
            .into_iter()
            .collect();
        storage.save_formal_skills(session.id, id, &skills).unwrap();
        (share(storage), id)
    }

    #[test]
    fn test_assemble_uses_latest_statistics() {
        let (storage, id) = seeded();

        let detail = with_storage(&storage, |s| assemble_detail(&*s, id)).unwrap();

        assert_eq!(detail.vacancy_count, 4);
        assert_eq!(detail.formal_skills[0], SkillCount::new("rust", 4));
        assert!(detail.extracted_skills.is_empty());
    }

    #[test]
    fn test_assemble_without_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let id = storage.upsert_profession("Go", "golang", true).unwrap();

        let result = assemble_detail(&storage, id);

        match result {
            Err(e @ StorageError::StatisticsNotFound(_)) => {
                assert_eq!(e.to_string(), "No statistics recorded for profession: Go");
            }
            other => panic!("expected StatisticsNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_storage() {
        let (storage, id) = seeded();
        let cache = MemoryCache::new();
        let cached = sample_detail(id);
        cache.save(&cached, Duration::from_secs(60)).await.unwrap();

        let detail = profession_detail(&storage, &cache, None, id).await.unwrap();

        assert_eq!(detail, cached);
    }

    #[tokio::test]
    async fn test_miss_populates_cache() {
        let (storage, id) = seeded();
        let cache = Arc::new(MemoryCache::new());
        let (writer, worker) = CacheWriter::spawn(
            cache.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
            4,
        );

        let detail = profession_detail(&storage, cache.as_ref(), Some(&writer), id)
            .await
            .unwrap();
        worker.shutdown(Duration::from_secs(5)).await;

        assert_eq!(cache.load(id).await.unwrap(), Some(detail));
    }

    #[tokio::test]
    async fn test_unknown_profession() {
        let (storage, _) = seeded();
        let cache = MemoryCache::new();

        let result = profession_detail(&storage, &cache, None, 999).await;

        assert!(matches!(
            result,
            Err(HarvestError::Storage(StorageError::ProfessionNotFound(_)))
        ));
    }
}
