use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, read_input};
use crate::toc::config::load_config;
use crate::toc::outline::{Outline, OutlineParser};

pub fn render_outline(report: &mut CommandReport, outline: &Outline) {
    for section in outline {
        report.line(format!(
            "{}{} (level {}, raw {})",
            "  ".repeat(section.level.saturating_sub(1)),
            section.title,
            section.level,
            section.raw_level
        ));
    }
}

pub fn run(path: &Path) -> Result<CommandReport> {
    let cfg = load_config()?;
    let text = read_input(path)?;
    let outline = OutlineParser::new(cfg.parser.marker).parse(&text);

    let mut report = CommandReport::new("outline");
    report.detail(format!("file={}", path.display()));
    report.detail(format!("sections={}", outline.len()));
    if outline.is_empty() {
        report.detail("no headings found");
    }
    render_outline(&mut report, &outline);
    report.set_data(&outline)?;
    Ok(report)
}
