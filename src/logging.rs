use anyhow::{Result, anyhow};
use flexi_logger::{Logger, LoggerHandle};
use std::env;
use std::sync::OnceLock;

pub const DEFAULT_LOG_LEVEL: &str = "warn";

static LOGGING_STATE: OnceLock<LoggingState> = OnceLock::new();

struct LoggingState {
    level: &'static str,
    _logger: LoggerHandle,
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" | "none" => Ok("off"),
        other => Err(anyhow!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        )),
    }
}

fn requested_level(flag: Option<&str>) -> String {
    if let Some(level) = flag
        && !level.trim().is_empty()
    {
        return level.to_string();
    }
    match env::var("TOC_LOG") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => DEFAULT_LOG_LEVEL.to_string(),
    }
}

/// Starts the stderr logger once per process. Later calls are no-ops.
pub fn init_logging(flag: Option<&str>) -> Result<()> {
    if LOGGING_STATE.get().is_some() {
        return Ok(());
    }
    let level = normalize_level(&requested_level(flag))?;

    let logger = Logger::try_with_str(level)
        .map_err(|err| anyhow!("invalid log level `{level}`: {err}"))?
        .log_to_stderr()
        .format_for_stderr(flexi_logger::default_format)
        .start()
        .map_err(|err| anyhow!("failed to start logger: {err}"))?;

    log::debug!(
        "event=logging_init level={} version={} build={}",
        level,
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_UUID")
    );

    let _ = LOGGING_STATE.set(LoggingState {
        level,
        _logger: logger,
    });
    Ok(())
}

pub fn active_level() -> Option<&'static str> {
    LOGGING_STATE.get().map(|state| state.level)
}

#[cfg(test)]
mod tests {
    use super::{normalize_level, requested_level};

    #[test]
    fn normalize_level_accepts_known_values() {
        assert_eq!(normalize_level("INFO").expect("info"), "info");
        assert_eq!(normalize_level(" warning ").expect("warn"), "warn");
        assert_eq!(normalize_level("off").expect("off"), "off");
    }

    #[test]
    fn normalize_level_rejects_unknown() {
        let err = normalize_level("verbose").expect_err("unknown");
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn flag_takes_precedence() {
        assert_eq!(requested_level(Some("debug")), "debug");
    }
}
