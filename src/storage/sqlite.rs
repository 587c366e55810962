//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SkillKind, Storage, StorageError, StorageResult};
use crate::storage::{ProfessionRecord, SessionRecord, SkillCount, StatRecord};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_uuid(raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn profession_from_row(row: &Row<'_>) -> rusqlite::Result<ProfessionRecord> {
    Ok(ProfessionRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        query: row.get(2)?,
        active: row.get::<_, i64>(3)? != 0,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        created_at: row.get(1)?,
        config_hash: row.get(2)?,
    })
}

fn stat_from_row(row: &Row<'_>) -> rusqlite::Result<StatRecord> {
    Ok(StatRecord {
        session_id: parse_uuid(&row.get::<_, String>(0)?)?,
        profession_id: row.get(1)?,
        vacancy_count: row.get::<_, i64>(2)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Profession Management =====

    fn upsert_profession(&mut self, name: &str, query: &str, active: bool) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO professions (name, vacancy_query, is_active) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET vacancy_query = excluded.vacancy_query,
                                             is_active = excluded.is_active",
            params![name, query, active as i64],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM professions WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    fn get_profession(&self, profession_id: i64) -> StorageResult<ProfessionRecord> {
        self.conn
            .query_row(
                "SELECT id, name, vacancy_query, is_active FROM professions WHERE id = ?1",
                params![profession_id],
                profession_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::ProfessionNotFound(profession_id.to_string()))
    }

    fn list_professions(&self) -> StorageResult<Vec<ProfessionRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, vacancy_query, is_active FROM professions ORDER BY name")?;

        let professions = stmt
            .query_map([], profession_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(professions)
    }

    fn list_active_professions(&self) -> StorageResult<Vec<ProfessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, vacancy_query, is_active FROM professions
             WHERE is_active = 1 ORDER BY name",
        )?;

        let professions = stmt
            .query_map([], profession_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(professions)
    }

    fn set_profession_active(&mut self, profession_id: i64, active: bool) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE professions SET is_active = ?1 WHERE id = ?2",
            params![active as i64, profession_id],
        )?;

        if updated == 0 {
            return Err(StorageError::ProfessionNotFound(profession_id.to_string()));
        }
        Ok(())
    }

    // ===== Session Management =====

    fn create_session(&mut self, config_hash: &str) -> StorageResult<SessionRecord> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now().to_rfc3339(),
            config_hash: config_hash.to_string(),
        };

        self.conn.execute(
            "INSERT INTO scraping_sessions (id, created_at, config_hash) VALUES (?1, ?2, ?3)",
            params![session.id.to_string(), session.created_at, session.config_hash],
        )?;

        Ok(session)
    }

    fn get_session(&self, session_id: Uuid) -> StorageResult<SessionRecord> {
        self.conn
            .query_row(
                "SELECT id, created_at, config_hash FROM scraping_sessions WHERE id = ?1",
                params![session_id.to_string()],
                session_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::SessionNotFound(session_id.to_string()))
    }

    fn latest_session(&self) -> StorageResult<Option<SessionRecord>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, created_at, config_hash FROM scraping_sessions
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [],
                session_from_row,
            )
            .optional()?;

        Ok(session)
    }

    fn list_sessions(&self) -> StorageResult<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, config_hash FROM scraping_sessions
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    // ===== Statistics =====

    fn save_stat(
        &mut self,
        session_id: Uuid,
        profession_id: i64,
        vacancy_count: u64,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO stats (session_id, profession_id, vacancy_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id, profession_id) DO UPDATE SET vacancy_count = excluded.vacancy_count",
            params![session_id.to_string(), profession_id, vacancy_count as i64],
        )?;
        Ok(())
    }

    fn save_skills(
        &mut self,
        kind: SkillKind,
        session_id: Uuid,
        profession_id: i64,
        skills: &HashMap<String, u32>,
    ) -> StorageResult<()> {
        if skills.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "INSERT INTO {} (session_id, profession_id, skill, count) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, profession_id, skill) DO UPDATE SET count = excluded.count",
            kind.table()
        );
        let session = session_id.to_string();

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (skill, count) in skills {
                stmt.execute(params![session, profession_id, skill, count])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn get_stat(&self, session_id: Uuid, profession_id: i64) -> StorageResult<Option<StatRecord>> {
        let stat = self
            .conn
            .query_row(
                "SELECT session_id, profession_id, vacancy_count FROM stats
                 WHERE session_id = ?1 AND profession_id = ?2",
                params![session_id.to_string(), profession_id],
                stat_from_row,
            )
            .optional()?;

        Ok(stat)
    }

    fn latest_stat(&self, profession_id: i64) -> StorageResult<Option<StatRecord>> {
        let stat = self
            .conn
            .query_row(
                "SELECT s.session_id, s.profession_id, s.vacancy_count
                 FROM stats s JOIN scraping_sessions ss ON ss.id = s.session_id
                 WHERE s.profession_id = ?1
                 ORDER BY ss.created_at DESC, s.id DESC LIMIT 1",
                params![profession_id],
                stat_from_row,
            )
            .optional()?;

        Ok(stat)
    }

    fn get_session_stats(&self, session_id: Uuid) -> StorageResult<Vec<StatRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, profession_id, vacancy_count FROM stats
             WHERE session_id = ?1 ORDER BY profession_id",
        )?;

        let stats = stmt
            .query_map(params![session_id.to_string()], stat_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }

    fn get_skills(
        &self,
        kind: SkillKind,
        session_id: Uuid,
        profession_id: i64,
    ) -> StorageResult<Vec<SkillCount>> {
        let sql = format!(
            "SELECT skill, count FROM {} WHERE session_id = ?1 AND profession_id = ?2
             ORDER BY count DESC, skill ASC",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let skills = stmt
            .query_map(params![session_id.to_string(), profession_id], |row| {
                Ok(SkillCount {
                    skill: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(skills)
    }
}
