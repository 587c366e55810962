//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Skill-Harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Professions tracked over time (admin-managed, read-only to runs)
CREATE TABLE IF NOT EXISTS professions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    vacancy_query TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_professions_active ON professions(is_active);

-- One row per persisted scraping run
CREATE TABLE IF NOT EXISTS scraping_sessions (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    config_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_created ON scraping_sessions(created_at);

-- Vacancy count per profession per session
CREATE TABLE IF NOT EXISTS stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES scraping_sessions(id),
    profession_id INTEGER NOT NULL REFERENCES professions(id),
    vacancy_count INTEGER NOT NULL,
    UNIQUE(session_id, profession_id)
);

-- Skill tags attached to vacancies by the upstream
CREATE TABLE IF NOT EXISTS formal_skills (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES scraping_sessions(id),
    profession_id INTEGER NOT NULL REFERENCES professions(id),
    skill TEXT NOT NULL,
    count INTEGER NOT NULL,
    UNIQUE(session_id, profession_id, skill)
);

CREATE INDEX IF NOT EXISTS idx_formal_skills_lookup ON formal_skills(profession_id, session_id);

-- Skills found in vacancy descriptions
CREATE TABLE IF NOT EXISTS extracted_skills (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES scraping_sessions(id),
    profession_id INTEGER NOT NULL REFERENCES professions(id),
    skill TEXT NOT NULL,
    count INTEGER NOT NULL,
    UNIQUE(session_id, profession_id, skill)
);

CREATE INDEX IF NOT EXISTS idx_extracted_skills_lookup ON extracted_skills(profession_id, session_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
