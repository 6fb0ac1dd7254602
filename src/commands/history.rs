use anyhow::{Result, anyhow};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::commands::{CommandReport, apply_rename_overrides};
use crate::error::TocError;
use crate::toc::assembler::{AssemblerConfig, History, RenameEvent, Snapshot};
use crate::toc::audit;
use crate::toc::cache::CachedSource;
use crate::toc::config::{SamplingMode, TocConfig, load_config};
use crate::toc::paths::{TocPaths, resolve_paths};
use crate::toc::pipeline::{Reconstruction, reconstruct};
use crate::toc::util::truncate_with_ellipsis;
use crate::toc::warn;
use crate::wiki::api::WikiApiSource;
use crate::wiki::dump::DumpSource;
use crate::wiki::{RevisionSource, TimeWindow, format_api_timestamp};

const MAX_TITLE_CHARS: usize = 80;

#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    pub page: String,
    pub revisions_file: Option<PathBuf>,
    pub mode: Option<SamplingMode>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub years_back: Option<u32>,
    pub significance_threshold: Option<f64>,
    pub rename_threshold: Option<f64>,
    pub no_renames: bool,
    pub no_cache: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryData<'a> {
    page: &'a str,
    mode: &'static str,
    window_start: String,
    window_end: String,
    history: &'a History,
    renames: Vec<RenameEvent>,
}

fn render_snapshot(report: &mut CommandReport, snap: &Snapshot) {
    let significance = snap
        .significance
        .map(|s| format!("{s:.1}"))
        .unwrap_or_else(|| "-".to_string());
    let summary = snap.change_summary.as_deref().unwrap_or_default();
    report.line(format!(
        "== {} (significance {}) {}",
        snap.key, significance, summary
    ));

    for section in &snap.sections {
        let indent = "  ".repeat(section.level);
        let title = truncate_with_ellipsis(&section.title, MAX_TITLE_CHARS);
        let tag = match (&section.previous_title, section.is_new) {
            (Some(old), _) if section.is_renamed => format!(" [renamed from \"{old}\"]"),
            (_, true) => " [new]".to_string(),
            _ => String::new(),
        };
        report.line(format!("{indent}{title}{tag}"));
    }

    if !snap.removed_titles.is_empty() {
        let removed: Vec<&str> = snap.removed_titles.iter().map(String::as_str).collect();
        report.line(format!("  removed: {}", removed.join(", ")));
    }
}

fn render_history(report: &mut CommandReport, history: &History) {
    for snap in history.iter() {
        render_snapshot(report, snap);
    }

    let renames = history.renames();
    if renames.is_empty() {
        report.line("renames: none");
    } else {
        report.line("renames:");
        for event in &renames {
            report.line(format!("  {}: \"{}\" -> \"{}\"", event.key, event.old, event.new));
        }
    }

    report.line("sections:");
    for snap in history.iter() {
        report.line(format!("  {}: {}", snap.key, snap.sections.len()));
    }
}

fn build_source(
    opts: &HistoryOptions,
    cfg: &TocConfig,
    cache_dir: &Path,
) -> Result<Box<dyn RevisionSource>> {
    if let Some(path) = &opts.revisions_file {
        let dump = DumpSource::load(path)?;
        log::info!(
            "event=dump_loaded path={} revisions={}",
            path.display(),
            dump.len()
        );
        return Ok(Box::new(dump));
    }
    let api = WikiApiSource::new(&cfg.source)?;
    if cfg.source.cache_enabled && !opts.no_cache {
        let cached = CachedSource::new(api, cache_dir);
        log::debug!("event=cache_enabled dir={}", cached.dir().display());
        return Ok(Box::new(cached));
    }
    Ok(Box::new(api))
}

fn record_audit(paths: &TocPaths, status: &str, message: &str) {
    if let Err(err) = audit::append_event(paths, "history", status, message) {
        warn::emit(
            "audit_failed",
            "history",
            "audit.log",
            "event not recorded",
            &format!("{err:#}"),
        );
    }
}

pub fn run(opts: &HistoryOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut cfg = load_config()?;
    if let Some(mode) = opts.mode {
        cfg.sampling.mode = mode;
    }
    if let Some(years_back) = opts.years_back {
        cfg.sampling.years_back = years_back;
    }
    if let Some(threshold) = opts.significance_threshold {
        cfg.sampling.significance_threshold = threshold;
    }
    apply_rename_overrides(&mut cfg, opts.rename_threshold, opts.no_renames)?;

    let tz = cfg.timezone()?;
    let current_year = Utc::now().with_timezone(&tz).year();
    let end_year = opts.end_year.unwrap_or(current_year);
    let start_year = match opts.start_year {
        Some(year) => year,
        None => i32::try_from(cfg.sampling.years_back)
            .ok()
            .and_then(|back| end_year.checked_sub(back))
            .ok_or_else(|| {
                anyhow!(TocError::InvalidConfig(format!(
                    "years back: {} reaches before any representable year",
                    cfg.sampling.years_back
                )))
            })?,
    };
    let window = TimeWindow::from_years(start_year, end_year, tz)?;
    let assembler_cfg = AssemblerConfig::from_config(&cfg, start_year, end_year)?;

    let source = build_source(opts, &cfg, &paths.cache_dir)?;
    let mut report = CommandReport::new("history");
    report.detail(format!("page={}", opts.page));
    report.detail(format!("source={}", source.describe()));
    report.detail(format!("mode={}", cfg.sampling.mode.label()));
    report.detail(format!("window={start_year}..={end_year} ({})", tz.name()));

    let Reconstruction {
        history,
        listed,
        fetched,
        fetch_failures,
        skipped,
    } = match reconstruct(source.as_ref(), &opts.page, &window, &assembler_cfg) {
        Ok(out) => out,
        Err(err) => {
            record_audit(
                &paths,
                "failed",
                &format!("page={} err={err:#}", opts.page),
            );
            return Err(err);
        }
    };

    report.detail(format!("revisions_listed={listed}"));
    report.detail(format!("revisions_fetched={fetched}"));
    report.detail(format!("fetch_failures={fetch_failures}"));
    report.detail(format!("revisions_skipped={skipped}"));
    report.detail(format!("snapshots_retained={}", history.len()));

    render_history(&mut report, &history);
    report.set_data(&HistoryData {
        page: &opts.page,
        mode: cfg.sampling.mode.label(),
        window_start: format_api_timestamp(&window.start),
        window_end: format_api_timestamp(&window.end),
        history: &history,
        renames: history.renames(),
    })?;

    record_audit(
        &paths,
        "ok",
        &format!(
            "page={} mode={} retained={} listed={listed} fetch_failures={fetch_failures}",
            opts.page,
            cfg.sampling.mode.label(),
            history.len()
        ),
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toc::assembler::{RevisionInput, assemble};
    use crate::toc::rename::RenameDetectionConfig;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    #[test]
    fn timeline_tags_new_and_renamed_sections() {
        let cfg = AssemblerConfig {
            mode: SamplingMode::Yearly,
            start_year: 2019,
            end_year: 2020,
            significance_threshold: 5.0,
            timezone: Tz::UTC,
            rename: RenameDetectionConfig::default(),
            marker: '=',
        };
        let rev = |year: i32, text: &str| RevisionInput {
            timestamp: Utc.with_ymd_and_hms(year, 3, 1, 0, 0, 0).single().expect("ts"),
            source_id: year.to_string(),
            text: Some(text.to_string()),
        };
        let history = assemble(
            vec![
                rev(2019, "==History==\n===Early===\n==Uses=="),
                rev(2020, "==history==\n===Early===\n==Reception=="),
            ],
            cfg,
        );

        let mut report = CommandReport::new("history");
        render_history(&mut report, &history);
        let body = report.body.join("\n");

        assert!(body.contains("== 2019 (significance 10.0) Initial version"));
        assert!(body.contains("  history [renamed from \"History\"]"));
        assert!(body.contains("    Early\n"));
        assert!(body.contains("  Reception [new]"));
        assert!(body.contains("  removed: Uses"));
        assert!(body.contains("  2020: \"History\" -> \"history\""));
        assert!(body.contains("  2019: 3"));
    }
}
