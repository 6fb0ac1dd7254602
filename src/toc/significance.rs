use crate::toc::outline::Outline;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const MAX_SIGNIFICANCE: f64 = 10.0;
pub const NEUTRAL_SIGNIFICANCE: f64 = 5.0;
pub const INITIAL_SUMMARY: &str = "Initial version";
pub const MINOR_SUMMARY: &str = "Minor changes";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeScore {
    pub significance: f64,
    pub summary: String,
    pub added: usize,
    pub removed: usize,
    pub level_changes: usize,
}

impl ChangeScore {
    fn initial() -> Self {
        Self {
            significance: MAX_SIGNIFICANCE,
            summary: INITIAL_SUMMARY.to_string(),
            added: 0,
            removed: 0,
            level_changes: 0,
        }
    }

    fn neutral(reason: &str) -> Self {
        Self {
            significance: NEUTRAL_SIGNIFICANCE,
            summary: format!("Unable to score change: {reason}"),
            added: 0,
            removed: 0,
            level_changes: 0,
        }
    }
}

fn first_levels(outline: &Outline) -> BTreeMap<&str, usize> {
    let mut out = BTreeMap::new();
    for section in outline {
        out.entry(section.title.as_str()).or_insert(section.level);
    }
    out
}

fn malformed_reason(outline: &Outline) -> Option<String> {
    outline.iter().enumerate().find_map(|(idx, section)| {
        if section.title.trim().is_empty() {
            Some(format!("section {idx} has no title"))
        } else if section.level == 0 {
            Some(format!("section {idx} has level 0"))
        } else {
            None
        }
    })
}

/// Scores how disruptive the change from `previous` to `current` was.
///
/// A missing predecessor is the baseline and scores the maximum. Malformed
/// outlines get the neutral score instead of an error so that one bad
/// snapshot does not stop a whole history.
pub fn score_change(current: &Outline, previous: Option<&Outline>) -> ChangeScore {
    let Some(previous) = previous else {
        return ChangeScore::initial();
    };
    if let Some(reason) = malformed_reason(current).or_else(|| malformed_reason(previous)) {
        return ChangeScore::neutral(&reason);
    }

    let current_levels = first_levels(current);
    let previous_levels = first_levels(previous);
    let current_titles: BTreeSet<&str> = current_levels.keys().copied().collect();
    let previous_titles: BTreeSet<&str> = previous_levels.keys().copied().collect();

    let added = current_titles.difference(&previous_titles).count();
    let removed = previous_titles.difference(&current_titles).count();
    let level_changes = current_levels
        .iter()
        .filter(|(title, level)| {
            previous_levels
                .get(*title)
                .is_some_and(|prev| prev != *level)
        })
        .count();

    let total_changes = added + removed;
    let raw = (total_changes * 2 + level_changes * 3) as f64 / 2.0;
    let significance = raw.min(MAX_SIGNIFICANCE);

    let mut parts = Vec::new();
    if added > 0 {
        parts.push(format!("Added {added} section(s)"));
    }
    if removed > 0 {
        parts.push(format!("Removed {removed} section(s)"));
    }
    if level_changes > 0 {
        parts.push(format!("Changed level of {level_changes} section(s)"));
    }
    let summary = if parts.is_empty() {
        MINOR_SUMMARY.to_string()
    } else {
        parts.join(", ")
    };

    ChangeScore {
        significance,
        summary,
        added,
        removed,
        level_changes,
    }
}

/// Same as [`score_change`] for loosely shaped records.
pub fn score_change_value(current: &Value, previous: Option<&Value>) -> ChangeScore {
    let current = match Outline::from_value(current) {
        Ok(outline) => outline,
        Err(err) => return ChangeScore::neutral(&format!("current {err}")),
    };
    let Some(previous) = previous else {
        return score_change(&current, None);
    };
    match Outline::from_value(previous) {
        Ok(previous) => score_change(&current, Some(&previous)),
        Err(err) => ChangeScore::neutral(&format!("previous {err}")),
    }
}
