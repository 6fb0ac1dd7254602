use crate::error::TocError;
use crate::toc::outline::DEFAULT_HEADING_MARKER;
use crate::toc::rename::RenameDetectionConfig;
use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = concat!(
    "toc-history/",
    env!("CARGO_PKG_VERSION"),
    " (table-of-contents history reconstruction)"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    Yearly,
    Significant,
}

impl SamplingMode {
    pub fn label(self) -> &'static str {
        match self {
            SamplingMode::Yearly => "yearly",
            SamplingMode::Significant => "significant",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yearly" | "year" => Some(SamplingMode::Yearly),
            "significant" | "significance" => Some(SamplingMode::Significant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub mode: SamplingMode,
    pub significance_threshold: f64,
    pub years_back: u32,
    pub timezone: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Yearly,
            significance_threshold: 5.0,
            years_back: 5,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub marker: char,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_HEADING_MARKER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub cache_enabled: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 45,
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TocConfig {
    pub rename: RenameDetectionConfig,
    pub sampling: SamplingConfig,
    pub parser: ParserConfig,
    pub source: SourceConfig,
}

impl TocConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.sampling
            .timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!(TocError::InvalidConfig(format!("timezone: {err}"))))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTocConfig {
    rename: Option<RenameDetectionConfig>,
    sampling: Option<SamplingConfig>,
    parser: Option<ParserConfig>,
    source: Option<SourceConfig>,
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_mode(var: &str, fallback: SamplingMode) -> SamplingMode {
    match env::var(var) {
        Ok(v) => SamplingMode::parse(&v).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_marker(var: &str, fallback: char) -> char {
    match env::var(var) {
        Ok(v) => {
            let mut chars = v.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => ch,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn invalid(msg: impl Into<String>) -> anyhow::Error {
    anyhow!(TocError::InvalidConfig(msg.into()))
}

pub fn validate(cfg: &TocConfig) -> Result<()> {
    let t = cfg.rename.threshold;
    if !(t > 0.0 && t <= 1.0) {
        return Err(invalid("rename threshold: require 0 < threshold <= 1.0"));
    }
    let w = &cfg.rename.weights;
    if [w.base, w.length, w.prefix]
        .iter()
        .any(|weight| !weight.is_finite() || *weight < 0.0)
    {
        return Err(invalid("similarity weights must be finite and non-negative"));
    }
    if (w.total() - 1.0).abs() > 1e-6 {
        return Err(invalid("similarity weights must sum to 1.0"));
    }
    let s = cfg.sampling.significance_threshold;
    if !(1.0..=10.0).contains(&s) {
        return Err(invalid("significance threshold: require 1 <= threshold <= 10"));
    }
    if cfg.sampling.years_back == 0 {
        return Err(invalid("years back: must be >= 1"));
    }
    cfg.timezone()?;
    let marker = cfg.parser.marker;
    if marker.is_whitespace() || marker.is_alphanumeric() {
        return Err(invalid(
            "heading marker must be a single punctuation character",
        ));
    }
    if cfg.source.api_url.trim().is_empty() {
        return Err(invalid("api url cannot be empty"));
    }
    if cfg.source.request_timeout_secs == 0 {
        return Err(invalid("request timeout: must be >= 1 second"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("TOC_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    if let Ok(home) = env::var("TOC_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed).join("config.toml"));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".toc-history").join("config.toml"))
}

fn parse_partial(raw: &str) -> Result<PartialTocConfig> {
    toml::from_str(raw).map_err(|err| anyhow!(err))
}

fn merge_partial(base: &mut TocConfig, parsed: PartialTocConfig) {
    if let Some(rename) = parsed.rename {
        base.rename = rename;
    }
    if let Some(sampling) = parsed.sampling {
        base.sampling = sampling;
    }
    if let Some(parser) = parsed.parser {
        base.parser = parser;
    }
    if let Some(source) = parsed.source {
        base.source = source;
    }
}

fn merge_file_config(base: &mut TocConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed = parse_partial(&raw)
        .map_err(|err| invalid(format!("failed to parse {}: {err}", path.display())))?;
    merge_partial(base, parsed);
    Ok(())
}

fn merge_env(cfg: &mut TocConfig) {
    cfg.rename.threshold = env_or_f64("TOC_RENAME_THRESHOLD", cfg.rename.threshold);
    cfg.rename.enabled = env_or_bool("TOC_RENAME_DETECTION", cfg.rename.enabled);
    cfg.rename.hierarchy_guard = env_or_bool("TOC_HIERARCHY_GUARD", cfg.rename.hierarchy_guard);
    cfg.sampling.mode = env_or_mode("TOC_SAMPLING_MODE", cfg.sampling.mode);
    cfg.sampling.significance_threshold = env_or_f64(
        "TOC_SIGNIFICANCE_THRESHOLD",
        cfg.sampling.significance_threshold,
    );
    cfg.sampling.years_back = env_or_u32("TOC_YEARS_BACK", cfg.sampling.years_back);
    cfg.sampling.timezone = env_or_string("TOC_TIMEZONE", &cfg.sampling.timezone);
    cfg.parser.marker = env_or_marker("TOC_HEADING_MARKER", cfg.parser.marker);
    cfg.source.api_url = env_or_string("TOC_API_URL", &cfg.source.api_url);
    cfg.source.user_agent = env_or_string("TOC_USER_AGENT", &cfg.source.user_agent);
    cfg.source.request_timeout_secs = env_or_u64(
        "TOC_REQUEST_TIMEOUT_SECS",
        cfg.source.request_timeout_secs,
    );
    cfg.source.cache_enabled = env_or_bool("TOC_CACHE_ENABLED", cfg.source.cache_enabled);
}

/// Defaults, then the config file, then `TOC_*` environment overrides.
/// Command-line overrides are applied by the caller, which validates again.
pub fn load_config() -> Result<TocConfig> {
    let mut cfg = TocConfig::default();
    merge_file_config(&mut cfg)?;
    merge_env(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
