use crate::toc::config::{SamplingMode, TocConfig};
use crate::toc::outline::{Outline, OutlineParser};
use crate::toc::rename::{MatchDecision, RenameDetectionConfig, resolve_renames};
use crate::toc::significance::{ChangeScore, score_change};
use crate::wiki::format_api_timestamp;
use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One revision as handed to the assembler. `text` is `None` when the source
/// had nothing for it.
#[derive(Debug, Clone)]
pub struct RevisionInput {
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub mode: SamplingMode,
    pub start_year: i32,
    pub end_year: i32,
    pub significance_threshold: f64,
    pub timezone: Tz,
    pub rename: RenameDetectionConfig,
    pub marker: char,
}

impl AssemblerConfig {
    pub fn from_config(cfg: &TocConfig, start_year: i32, end_year: i32) -> Result<Self> {
        Ok(Self {
            mode: cfg.sampling.mode,
            start_year,
            end_year,
            significance_threshold: cfg.sampling.significance_threshold,
            timezone: cfg.timezone()?,
            rename: cfg.rename.clone(),
            marker: cfg.parser.marker,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    AwaitingFirstSnapshot,
    Accumulating,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoContent,
    NoHeadings,
    OutOfOrder,
}

impl SkipReason {
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::NoContent => "no content",
            SkipReason::NoHeadings => "no headings",
            SkipReason::OutOfOrder => "out of order",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    Retained { key: String },
    /// Parsed and scored, but the sampling policy did not keep it.
    Processed { significance: f64 },
    Skipped(SkipReason),
    NotWanted,
    Closed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub key: String,
    pub timestamp: String,
    pub sections: Outline,
    pub removed_titles: BTreeSet<String>,
    pub renamed_map: BTreeMap<String, String>,
    pub significance: Option<f64>,
    pub change_summary: Option<String>,
    pub source_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rename_trace: Vec<MatchDecision>,
}

/// Retained snapshots ordered by key.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct History {
    snapshots: BTreeMap<String, Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameEvent {
    pub key: String,
    pub old: String,
    pub new: String,
}

impl History {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        self.snapshots.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }

    /// Every rename across the history, oldest first.
    pub fn renames(&self) -> Vec<RenameEvent> {
        let mut out = Vec::new();
        for snap in self.iter() {
            for section in &snap.sections {
                if let Some(old) = &section.previous_title
                    && section.is_renamed
                {
                    out.push(RenameEvent {
                        key: snap.key.clone(),
                        old: old.clone(),
                        new: section.title.clone(),
                    });
                }
            }
        }
        out
    }
}

/// Walks revisions oldest to newest and keeps the snapshots the sampling
/// policy asks for. Previous-outline state is held here, never globally.
pub struct Assembler {
    cfg: AssemblerConfig,
    parser: OutlineParser,
    state: AssemblerState,
    last_timestamp: Option<DateTime<Utc>>,
    last_processed: Option<Outline>,
    last_retained: Option<Outline>,
    retained_years: BTreeSet<i32>,
    history: History,
}

impl Assembler {
    pub fn new(cfg: AssemblerConfig) -> Self {
        let parser = OutlineParser::new(cfg.marker);
        Self {
            cfg,
            parser,
            state: AssemblerState::AwaitingFirstSnapshot,
            last_timestamp: None,
            last_processed: None,
            last_retained: None,
            retained_years: BTreeSet::new(),
            history: History::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    fn year_of(&self, ts: &DateTime<Utc>) -> i32 {
        ts.with_timezone(&self.cfg.timezone).year()
    }

    fn key_for(&self, ts: &DateTime<Utc>) -> String {
        match self.cfg.mode {
            SamplingMode::Yearly => self.year_of(ts).to_string(),
            SamplingMode::Significant => format_api_timestamp(ts),
        }
    }

    /// Whether a revision at `ts` could still be retained. Callers use this
    /// to avoid fetching content that would be thrown away.
    pub fn wants(&self, ts: &DateTime<Utc>) -> bool {
        if self.state == AssemblerState::Done {
            return false;
        }
        let year = self.year_of(ts);
        if year < self.cfg.start_year || year > self.cfg.end_year {
            return false;
        }
        match self.cfg.mode {
            SamplingMode::Yearly => !self.retained_years.contains(&year),
            SamplingMode::Significant => true,
        }
    }

    pub fn feed(&mut self, input: RevisionInput) -> FeedOutcome {
        if self.state == AssemblerState::Done {
            return FeedOutcome::Closed;
        }
        if let Some(last) = self.last_timestamp
            && input.timestamp < last
        {
            return FeedOutcome::Skipped(SkipReason::OutOfOrder);
        }
        if !self.wants(&input.timestamp) {
            return FeedOutcome::NotWanted;
        }
        let Some(text) = input.text.as_deref() else {
            return FeedOutcome::Skipped(SkipReason::NoContent);
        };
        let outline = self.parser.parse(text);
        if outline.is_empty() {
            return FeedOutcome::Skipped(SkipReason::NoHeadings);
        }
        self.last_timestamp = Some(input.timestamp);

        let score = score_change(&outline, self.last_processed.as_ref());
        let key = self.key_for(&input.timestamp);
        let retain = !self.history.snapshots.contains_key(&key)
            && match self.cfg.mode {
                SamplingMode::Yearly => true,
                SamplingMode::Significant => {
                    self.last_retained.is_none()
                        || score.significance >= self.cfg.significance_threshold
                }
            };

        if !retain {
            let significance = score.significance;
            self.last_processed = Some(outline);
            return FeedOutcome::Processed { significance };
        }

        self.retained_years.insert(self.year_of(&input.timestamp));
        let snapshot = self.annotate(key.clone(), &input, outline.clone(), score);
        self.last_processed = Some(outline);
        self.last_retained = Some(snapshot.sections.clone());
        self.history.snapshots.insert(key.clone(), snapshot);
        self.state = AssemblerState::Accumulating;
        FeedOutcome::Retained { key }
    }

    fn annotate(
        &self,
        key: String,
        input: &RevisionInput,
        mut outline: Outline,
        score: ChangeScore,
    ) -> Snapshot {
        let mut snapshot = Snapshot {
            key,
            timestamp: format_api_timestamp(&input.timestamp),
            sections: Outline::default(),
            removed_titles: BTreeSet::new(),
            renamed_map: BTreeMap::new(),
            significance: Some(score.significance),
            change_summary: Some(score.summary),
            source_id: input.source_id.clone(),
            rename_trace: Vec::new(),
        };

        if let Some(previous) = &self.last_retained {
            let resolution = resolve_renames(previous, &outline, &self.cfg.rename);
            for section in &mut outline.sections {
                if let Some(old) = resolution.renamed.get(&section.title) {
                    section.is_renamed = true;
                    section.previous_title = Some(old.clone());
                } else if resolution.added.contains(&section.title) {
                    section.is_new = true;
                }
            }
            snapshot.removed_titles = resolution.removed;
            snapshot.renamed_map = resolution.renamed;
            snapshot.rename_trace = resolution.trace;
        }

        snapshot.sections = outline;
        snapshot
    }

    /// Closes the assembler and hands back everything retained.
    pub fn finish(&mut self) -> History {
        self.state = AssemblerState::Done;
        std::mem::take(&mut self.history)
    }
}

/// Runs a whole batch through a fresh assembler, sorting it oldest first.
#[cfg(test)]
pub fn assemble(mut inputs: Vec<RevisionInput>, cfg: AssemblerConfig) -> History {
    inputs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let mut assembler = Assembler::new(cfg);
    for input in inputs {
        assembler.feed(input);
    }
    assembler.finish()
}
