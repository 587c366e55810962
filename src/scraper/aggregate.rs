//! Skill aggregation over a profession's fetched vacancies

use crate::api::VacancyRecord;
use crate::extractor::extract_skills;
use crate::storage::SkillCount;
use std::collections::HashMap;
use tracing::debug;

/// Longest phrase, in words, matched against the formal skill set
pub const MAX_NGRAM: usize = 3;

/// Skill name to occurrence count
pub type SkillCounts = HashMap<String, u32>;

/// Counts each tag across all records; a tag listed on five vacancies counts five
pub fn formal_skill_counts(records: &[VacancyRecord]) -> SkillCounts {
    let mut counts = SkillCounts::new();
    for record in records {
        for skill in &record.skills {
            *counts.entry(skill.to_lowercase()).or_insert(0) += 1;
        }
    }
    counts
}

/// Sums description matches against the formal set over all records
///
/// Records with an empty description contribute nothing. With an empty
/// formal set there is nothing to match, so the result is empty.
pub fn extracted_skill_counts(records: &[VacancyRecord], whitelist: &SkillCounts) -> SkillCounts {
    let mut counts = SkillCounts::new();
    if whitelist.is_empty() {
        return counts;
    }

    for record in records {
        if record.description.trim().is_empty() {
            continue;
        }
        match extract_skills(&record.description, whitelist, MAX_NGRAM) {
            Ok(found) => {
                for (skill, count) in found {
                    *counts.entry(skill).or_insert(0) += count;
                }
            }
            Err(e) => debug!(error = %e, "Skipping description"),
        }
    }
    counts
}

/// Sorts counts by descending count, then by name
pub fn sorted_counts(counts: &SkillCounts) -> Vec<SkillCount> {
    let mut sorted: Vec<SkillCount> = counts
        .iter()
        .map(|(skill, count)| SkillCount::new(skill.clone(), *count))
        .collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.skill.cmp(&b.skill)));
    sorted
}
