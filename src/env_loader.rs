use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(toc_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    match toc_home {
        Some(dir) => Some(dir.join(".env")),
        None => Some(home_dir?.join(".toc-history").join(".env")),
    }
}

/// Loads `./.env`, falling back to the one under the tool's home directory.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let toc_home = env::var_os("TOC_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let Some(path) = fallback_dotenv_path(toc_home, dirs::home_dir()) else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
