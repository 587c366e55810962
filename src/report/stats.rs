//! Statistics of the latest scraping session
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{SessionRecord, SkillCount, Storage};
use crate::HarvestError;

/// Skills shown per profession in the summary
const TOP_SKILLS: usize = 5;

/// One profession's line in the summary
#[derive(Debug, Clone)]
pub struct ProfessionSummary {
    pub profession_id: i64,
    pub name: String,
    pub active: bool,

    /// None when the session holds no statistics for the profession
    pub vacancy_count: Option<u64>,

    /// Most frequent formal skills, at most [`TOP_SKILLS`]
    pub top_formal: Vec<SkillCount>,

    /// Most frequent extracted skills, at most [`TOP_SKILLS`]
    pub top_extracted: Vec<SkillCount>,
}

/// Summary of a scraping session
#[derive(Debug, Clone)]
pub struct SessionStatistics {
    pub session: SessionRecord,

    /// Number of persisted sessions, the summarized one included
    pub total_sessions: usize,

    pub professions: Vec<ProfessionSummary>,
}

impl SessionStatistics {
    /// Professions with a recorded vacancy count
    pub fn covered(&self) -> usize {
        self.professions
            .iter()
            .filter(|p| p.vacancy_count.is_some())
            .count()
    }

    pub fn total_vacancies(&self) -> u64 {
        self.professions.iter().filter_map(|p| p.vacancy_count).sum()
    }
}

/// Loads statistics of the most recent session from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(SessionStatistics))` - Statistics of the latest session
/// * `Ok(None)` - No session has been persisted yet
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_latest_statistics<S: Storage + ?Sized>(
    storage: &S,
) -> Result<Option<SessionStatistics>, HarvestError> {
    let session = match storage.latest_session()? {
        Some(session) => session,
        None => return Ok(None),
    };
    let total_sessions = storage.list_sessions()?.len();

    let mut professions = Vec::new();
    for profession in storage.list_professions()? {
        let vacancy_count = storage
            .get_stat(session.id, profession.id)?
            .map(|stat| stat.vacancy_count);

        let mut top_formal = storage.get_formal_skills(session.id, profession.id)?;
        top_formal.truncate(TOP_SKILLS);
        let mut top_extracted = storage.get_extracted_skills(session.id, profession.id)?;
        top_extracted.truncate(TOP_SKILLS);

        professions.push(ProfessionSummary {
            profession_id: profession.id,
            name: profession.name,
            active: profession.active,
            vacancy_count,
            top_formal,
            top_extracted,
        });
    }

    Ok(Some(SessionStatistics {
        session,
        total_sessions,
        professions,
    }))
}

fn join_skills(skills: &[SkillCount]) -> String {
    if skills.is_empty() {
        return "-".to_string();
    }
    skills
        .iter()
        .map(|s| format!("{} ({})", s.skill, s.count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SessionStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Session: {}", stats.session.id);
    println!("  Started: {}", stats.session.created_at);
    println!("  Config hash: {}", stats.session.config_hash);
    println!("  Sessions recorded: {}", stats.total_sessions);
    println!(
        "  Professions covered: {} / {}",
        stats.covered(),
        stats.professions.len()
    );
    println!("  Vacancies counted: {}", stats.total_vacancies());
    println!();

    println!("Professions:");
    for profession in &stats.professions {
        let count = match profession.vacancy_count {
            Some(count) => count.to_string(),
            None => "not collected".to_string(),
        };
        let marker = if profession.active { "" } else { " [inactive]" };

        println!(
            "  [{}] {}{}: {}",
            profession.profession_id, profession.name, marker, count
        );
        println!("      formal:    {}", join_skills(&profession.top_formal));
        println!("      extracted: {}", join_skills(&profession.top_extracted));
    }
}
