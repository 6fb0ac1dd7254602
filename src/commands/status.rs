use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::logging;
use crate::toc::audit::audit_log_path;
use crate::toc::config::{load_config, resolve_config_path};
use crate::toc::paths::resolve_paths;

include!(concat!(env!("OUT_DIR"), "/toc_env_allowlist.rs"));

fn env_is_set(key: &str) -> bool {
    env::var_os(key).is_some_and(|v| !v.is_empty())
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("version={}", env!("CARGO_PKG_VERSION")));
    report.detail(format!("build_uuid={}", env!("BUILD_UUID")));
    report.detail(format!("toc_home={}", paths.toc_home.display()));
    report.detail(format!("cache_dir={}", paths.cache_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("audit_log={}", audit_log_path(&paths).display()));
    report.detail(format!(
        "log_level={}",
        logging::active_level().unwrap_or(logging::DEFAULT_LOG_LEVEL)
    ));

    match resolve_config_path() {
        Some(path) if path.exists() => report.detail(format!("config_file={}", path.display())),
        Some(path) => report.detail(format!("config_file={} (absent)", path.display())),
        None => report.detail("config_file=unresolved"),
    }

    match load_config() {
        Ok(cfg) => {
            report.detail(format!("rename.enabled={}", cfg.rename.enabled));
            report.detail(format!("rename.threshold={}", cfg.rename.threshold));
            report.detail(format!("rename.hierarchy_guard={}", cfg.rename.hierarchy_guard));
            report.detail(format!("sampling.mode={}", cfg.sampling.mode.label()));
            report.detail(format!(
                "sampling.significance_threshold={}",
                cfg.sampling.significance_threshold
            ));
            report.detail(format!("sampling.years_back={}", cfg.sampling.years_back));
            report.detail(format!("sampling.timezone={}", cfg.sampling.timezone));
            report.detail(format!("parser.marker={}", cfg.parser.marker));
            report.detail(format!("source.api_url={}", cfg.source.api_url));
            report.detail(format!("source.cache_enabled={}", cfg.source.cache_enabled));
            report.set_data(&cfg)?;
        }
        Err(err) => report.issue(format!("config: {err:#}")),
    }

    let set: Vec<&str> = GENERATED_TOC_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env_is_set(key))
        .collect();
    if set.is_empty() {
        report.detail("env_overrides=none");
    } else {
        report.detail(format!("env_overrides={}", set.join(",")));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::GENERATED_TOC_ENV_ALLOWLIST;

    #[test]
    fn allowlist_covers_config_and_path_variables() {
        for key in ["TOC_HOME", "TOC_CONFIG_PATH", "TOC_RENAME_THRESHOLD", "TOC_LOG"] {
            assert!(GENERATED_TOC_ENV_ALLOWLIST.contains(&key), "{key}");
        }
        assert!(!GENERATED_TOC_ENV_ALLOWLIST.contains(&concat!("TOC_", "WARN")));
    }
}
