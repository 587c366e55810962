//! Harvest runs
//!
//! This module turns the vacancy API into per-session statistics:
//! - Partial-results collection for the page and item stages
//! - The three-stage harvest of a single profession
//! - Formal and extracted skill aggregation
//! - Run orchestration with per-profession time boxes

mod aggregate;
mod collect;
mod harvest;
mod orchestrator;

pub use aggregate::{
    extracted_skill_counts, formal_skill_counts, sorted_counts, SkillCounts, MAX_NGRAM,
};
pub use collect::{collect_partial, Failure, Partial};
pub use harvest::{harvest_profession, ProfessionHarvest};
pub use orchestrator::{
    OrchestratorSettings, ProfessionOutcome, ProfessionStatus, RunReport, ScrapeOrchestrator,
};
