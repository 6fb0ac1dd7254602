use crate::toc::outline::Outline;
use crate::toc::similarity::{SimilarityWeights, weighted_similarity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_RENAME_THRESHOLD: f64 = 0.65;
pub const ANCESTOR_SIMILARITY_FLOOR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameDetectionConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub hierarchy_guard: bool,
    pub weights: SimilarityWeights,
}

impl Default for RenameDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_RENAME_THRESHOLD,
            hierarchy_guard: true,
            weights: SimilarityWeights::default(),
        }
    }
}

/// One step of the matching, in the order it was decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchDecision {
    Unchanged {
        title: String,
    },
    CaseRename {
        old: String,
        new: String,
    },
    SimilarityRename {
        old: String,
        new: String,
        score: f64,
    },
    HierarchyRejected {
        old: String,
        candidate: String,
        score: f64,
        ancestor_similarity: f64,
    },
    Removed {
        old: String,
        best_candidate: Option<String>,
        best_score: Option<f64>,
    },
    Added {
        new: String,
    },
}

/// Partition of two title sets. `renamed` maps new title to old title.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenameResolution {
    pub unchanged: BTreeSet<String>,
    pub renamed: BTreeMap<String, String>,
    pub removed: BTreeSet<String>,
    pub added: BTreeSet<String>,
    pub trace: Vec<MatchDecision>,
}

impl RenameResolution {
    pub fn is_unchanged(&self) -> bool {
        self.renamed.is_empty() && self.removed.is_empty() && self.added.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    title: String,
    top_ancestor: Option<String>,
}

fn candidates_from_outline(outline: &Outline) -> Vec<Candidate> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for path in outline.section_paths() {
        let Some(title) = path.last() else {
            continue;
        };
        if !seen.insert(title.to_string()) {
            continue;
        }
        let top_ancestor = if path.len() > 1 {
            Some(path[0].to_string())
        } else {
            None
        };
        out.push(Candidate {
            title: title.to_string(),
            top_ancestor,
        });
    }
    out
}

#[cfg(test)]
fn candidates_from_titles<S: AsRef<str>>(titles: &[S]) -> Vec<Candidate> {
    let mut seen = BTreeSet::new();
    titles
        .iter()
        .map(AsRef::as_ref)
        .filter(|title| !title.is_empty() && seen.insert(title.to_string()))
        .map(|title| Candidate {
            title: title.to_string(),
            top_ancestor: None,
        })
        .collect()
}

/// Resolves renames between two outlines, using each section's top-level
/// ancestor for the hierarchy guard.
pub fn resolve_renames(
    previous: &Outline,
    current: &Outline,
    cfg: &RenameDetectionConfig,
) -> RenameResolution {
    resolve(
        candidates_from_outline(previous),
        candidates_from_outline(current),
        cfg,
    )
}

/// Resolves renames between two flat title lists.
#[cfg(test)]
pub fn resolve_titles<S: AsRef<str>>(
    previous: &[S],
    current: &[S],
    cfg: &RenameDetectionConfig,
) -> RenameResolution {
    resolve(
        candidates_from_titles(previous),
        candidates_from_titles(current),
        cfg,
    )
}

fn hierarchy_conflict(
    old: &Candidate,
    new: &Candidate,
    weights: &SimilarityWeights,
) -> Option<f64> {
    let (Some(old_top), Some(new_top)) = (&old.top_ancestor, &new.top_ancestor) else {
        return None;
    };
    if old_top == new_top {
        return None;
    }
    let ancestor_similarity = weighted_similarity(old_top, new_top, weights);
    (ancestor_similarity < ANCESTOR_SIMILARITY_FLOOR).then_some(ancestor_similarity)
}

fn resolve(
    previous: Vec<Candidate>,
    current: Vec<Candidate>,
    cfg: &RenameDetectionConfig,
) -> RenameResolution {
    let mut out = RenameResolution::default();

    let previous_titles: BTreeSet<&str> = previous.iter().map(|c| c.title.as_str()).collect();
    let current_titles: BTreeSet<&str> = current.iter().map(|c| c.title.as_str()).collect();

    for candidate in &previous {
        if current_titles.contains(candidate.title.as_str()) {
            out.unchanged.insert(candidate.title.clone());
            out.trace.push(MatchDecision::Unchanged {
                title: candidate.title.clone(),
            });
        }
    }

    let mut old_pool: Vec<&Candidate> = previous
        .iter()
        .filter(|c| !current_titles.contains(c.title.as_str()))
        .collect();
    let mut new_pool: Vec<&Candidate> = current
        .iter()
        .filter(|c| !previous_titles.contains(c.title.as_str()))
        .collect();
    let mut best_seen: BTreeMap<String, (String, f64)> = BTreeMap::new();

    if cfg.enabled {
        old_pool.retain(|old| {
            let folded = old.title.to_lowercase();
            let Some(pos) = new_pool
                .iter()
                .position(|new| new.title.to_lowercase() == folded)
            else {
                return true;
            };
            let new = new_pool.remove(pos);
            out.renamed.insert(new.title.clone(), old.title.clone());
            out.trace.push(MatchDecision::CaseRename {
                old: old.title.clone(),
                new: new.title.clone(),
            });
            false
        });

        old_pool.retain(|old| {
            let mut best: Option<(usize, f64)> = None;
            for (idx, new) in new_pool.iter().enumerate() {
                let score = weighted_similarity(&old.title, &new.title, &cfg.weights);
                if best.is_none_or(|(_, top)| score > top) {
                    best = Some((idx, score));
                }
            }
            let Some((idx, score)) = best else {
                return true;
            };
            best_seen.insert(old.title.clone(), (new_pool[idx].title.clone(), score));
            if score <= cfg.threshold {
                return true;
            }

            if cfg.hierarchy_guard
                && let Some(ancestor_similarity) =
                    hierarchy_conflict(old, new_pool[idx], &cfg.weights)
            {
                out.trace.push(MatchDecision::HierarchyRejected {
                    old: old.title.clone(),
                    candidate: new_pool[idx].title.clone(),
                    score,
                    ancestor_similarity,
                });
                return true;
            }

            let new = new_pool.remove(idx);
            out.renamed.insert(new.title.clone(), old.title.clone());
            out.trace.push(MatchDecision::SimilarityRename {
                old: old.title.clone(),
                new: new.title.clone(),
                score,
            });
            false
        });
    }

    for old in old_pool {
        let best = best_seen.remove(&old.title);
        out.removed.insert(old.title.clone());
        out.trace.push(MatchDecision::Removed {
            old: old.title.clone(),
            best_score: best.as_ref().map(|(_, score)| *score),
            best_candidate: best.map(|(title, _)| title),
        });
    }
    for new in new_pool {
        out.added.insert(new.title.clone());
        out.trace.push(MatchDecision::Added {
            new: new.title.clone(),
        });
    }

    out
}
