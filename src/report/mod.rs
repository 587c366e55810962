//! Reporting over persisted statistics
//!
//! This module provides the read side of the harvester:
//! - Per-profession detail served through the cache
//! - A summary of the latest scraping session

mod detail;
mod stats;

pub use detail::{assemble_detail, print_detail, profession_detail};
pub use stats::{load_latest_statistics, print_statistics, ProfessionSummary, SessionStatistics};
