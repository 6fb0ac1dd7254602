use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::commands::{CommandReport, apply_rename_overrides, read_input};
use crate::toc::config::load_config;
use crate::toc::outline::{Outline, OutlineParser};
use crate::toc::rename::{MatchDecision, RenameResolution, resolve_renames};
use crate::toc::significance::{ChangeScore, score_change, score_change_value};

#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub rename_threshold: Option<f64>,
    pub no_renames: bool,
}

#[derive(Debug, Serialize)]
struct DiffData<'a> {
    resolution: Option<&'a RenameResolution>,
    score: &'a ChangeScore,
}

enum Input {
    Parsed(Outline),
    Loose(Value),
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn load_input(path: &Path, parser: &OutlineParser) -> Result<Input> {
    let raw = read_input(path)?;
    if is_json(path) {
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;
        return Ok(Input::Loose(value));
    }
    Ok(Input::Parsed(parser.parse(&raw)))
}

fn render_decision(report: &mut CommandReport, decision: &MatchDecision) {
    let line = match decision {
        MatchDecision::Unchanged { title } => format!("  = {title}"),
        MatchDecision::CaseRename { old, new } => format!("  ~ \"{old}\" -> \"{new}\" (case)"),
        MatchDecision::SimilarityRename { old, new, score } => {
            format!("  ~ \"{old}\" -> \"{new}\" ({score:.2})")
        }
        MatchDecision::HierarchyRejected {
            old,
            candidate,
            score,
            ancestor_similarity,
        } => format!(
            "  ! \"{old}\" -/-> \"{candidate}\" ({score:.2}, parents {ancestor_similarity:.2})"
        ),
        MatchDecision::Removed {
            old,
            best_candidate,
            best_score,
        } => match (best_candidate, best_score) {
            (Some(c), Some(s)) => format!("  - {old} (closest \"{c}\" {s:.2})"),
            _ => format!("  - {old}"),
        },
        MatchDecision::Added { new } => format!("  + {new}"),
    };
    report.line(line);
}

pub fn run(old_path: &Path, new_path: &Path, opts: &DiffOptions) -> Result<CommandReport> {
    let mut cfg = load_config()?;
    apply_rename_overrides(&mut cfg, opts.rename_threshold, opts.no_renames)?;
    let parser = OutlineParser::new(cfg.parser.marker);

    let old_input = load_input(old_path, &parser)?;
    let new_input = load_input(new_path, &parser)?;

    let mut report = CommandReport::new("diff");
    report.detail(format!("old={}", old_path.display()));
    report.detail(format!("new={}", new_path.display()));

    let outlines = match (&old_input, &new_input) {
        (Input::Parsed(old), Input::Parsed(new)) => Ok((old.clone(), new.clone())),
        _ => {
            let as_outline = |input: &Input| match input {
                Input::Parsed(outline) => Ok(outline.clone()),
                Input::Loose(value) => Outline::from_value(value),
            };
            as_outline(&old_input).and_then(|old| as_outline(&new_input).map(|new| (old, new)))
        }
    };

    let (score, resolution) = match outlines {
        Ok((old, new)) => {
            let resolution = resolve_renames(&old, &new, &cfg.rename);
            (score_change(&new, Some(&old)), Some(resolution))
        }
        Err(malformed) => {
            // Scoring stays fail-soft; rename resolution needs real titles.
            let to_value = |input: &Input| match input {
                Input::Parsed(outline) => serde_json::to_value(outline).unwrap_or(Value::Null),
                Input::Loose(value) => value.clone(),
            };
            report.detail(format!("renames unavailable: {malformed}"));
            (
                score_change_value(&to_value(&new_input), Some(&to_value(&old_input))),
                None,
            )
        }
    };

    if let Some(resolution) = &resolution {
        report.detail(format!("unchanged={}", resolution.unchanged.len()));
        report.detail(format!("renamed={}", resolution.renamed.len()));
        report.detail(format!("removed={}", resolution.removed.len()));
        report.detail(format!("added={}", resolution.added.len()));
        if resolution.is_unchanged() {
            report.detail("titles unchanged");
        }
        report.line("matches:");
        for decision in &resolution.trace {
            render_decision(&mut report, decision);
        }
    }
    report.detail(format!("significance={:.1}", score.significance));
    report.line(format!(
        "significance: {:.1} ({})",
        score.significance, score.summary
    ));

    report.set_data(&DiffData {
        resolution: resolution.as_ref(),
        score: &score,
    })?;
    Ok(report)
}
