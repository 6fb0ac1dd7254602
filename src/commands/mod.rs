pub mod diff;
pub mod history;
pub mod outline;
pub mod status;

use crate::toc::config::{TocConfig, validate};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable rendering, printed instead of JSON in text mode.
    #[serde(skip)]
    pub body: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            data: None,
            body: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.body.push(text.into());
    }

    pub fn set_data<T: Serialize>(&mut self, data: &T) -> Result<()> {
        self.data = Some(serde_json::to_value(data).context("failed to encode report data")?);
        Ok(())
    }
}

/// Command-line overrides for rename detection, applied on top of the
/// loaded config and re-validated.
pub fn apply_rename_overrides(
    cfg: &mut TocConfig,
    threshold: Option<f64>,
    no_renames: bool,
) -> Result<()> {
    if let Some(t) = threshold {
        cfg.rename.threshold = t;
    }
    if no_renames {
        cfg.rename.enabled = false;
    }
    validate(cfg)
}

pub fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
