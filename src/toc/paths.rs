use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TocPaths {
    pub toc_home: PathBuf,
    pub cache_dir: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    env_path(var).unwrap_or(fallback)
}

pub fn resolve_paths() -> Result<TocPaths> {
    let toc_home = match env_path("TOC_HOME") {
        Some(path) => path,
        None => required_home_dir()?.join(".toc-history"),
    };

    let cache_dir = env_or_default_path("TOC_CACHE_DIR", toc_home.join("cache"));
    let logs_dir = env_or_default_path("TOC_LOGS_DIR", toc_home.join("logs"));

    Ok(TocPaths {
        toc_home,
        cache_dir,
        logs_dir,
    })
}
