use crate::toc::warn;
use crate::wiki::{RevisionMeta, RevisionSource, TimeWindow};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const NAMESPACE_HASH_CHARS: usize = 16;

/// Wraps a source and keeps fetched wikitext on disk, one file per revision.
/// Listings always go to the inner source.
pub struct CachedSource<S> {
    inner: S,
    dir: PathBuf,
}

fn namespace_dir(cache_root: &Path, namespace: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    cache_root.join(&digest[..NAMESPACE_HASH_CHARS])
}

fn entry_name(source_id: &str) -> String {
    let stem: String = source_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}.wikitext")
}

impl<S: RevisionSource> CachedSource<S> {
    pub fn new(inner: S, cache_root: &Path) -> Self {
        let dir = namespace_dir(cache_root, &inner.describe());
        Self { inner, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(entry_name(source_id))
    }

    fn store(&self, source_id: &str, content: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))?;
        tmp.write_all(content.as_bytes())?;
        let path = self.entry_path(source_id);
        tmp.persist(&path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to persist {}", path.display()))?;
        Ok(())
    }
}

impl<S: RevisionSource> RevisionSource for CachedSource<S> {
    fn describe(&self) -> String {
        format!("{} (cached)", self.inner.describe())
    }

    fn list_revisions(&self, page: &str, window: &TimeWindow) -> Result<Vec<RevisionMeta>> {
        self.inner.list_revisions(page, window)
    }

    fn fetch_content(&self, source_id: &str) -> Result<Option<String>> {
        let path = self.entry_path(source_id);
        if path.is_file() {
            match fs::read_to_string(&path) {
                Ok(content) => {
                    log::debug!("event=cache_hit source_id={source_id}");
                    return Ok(Some(content));
                }
                Err(err) => warn::emit(
                    "cache_read_failed",
                    "fetch",
                    source_id,
                    "unreadable cache entry",
                    &err.to_string(),
                ),
            }
        }

        let content = self.inner.fetch_content(source_id)?;
        if let Some(text) = &content
            && let Err(err) = self.store(source_id, text)
        {
            warn::emit(
                "cache_write_failed",
                "fetch",
                source_id,
                "content not cached",
                &format!("{err:#}"),
            );
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    struct CountingSource {
        fetches: Cell<usize>,
    }

    impl RevisionSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn list_revisions(&self, _page: &str, _window: &TimeWindow) -> Result<Vec<RevisionMeta>> {
            Ok(Vec::new())
        }

        fn fetch_content(&self, source_id: &str) -> Result<Option<String>> {
            self.fetches.set(self.fetches.get() + 1);
            if source_id == "empty" {
                return Ok(None);
            }
            Ok(Some(format!("==Rev {source_id}==")))
        }
    }

    #[test]
    fn second_fetch_is_served_from_disk() {
        let tmp = tempdir().expect("tempdir");
        let cached = CachedSource::new(
            CountingSource {
                fetches: Cell::new(0),
            },
            tmp.path(),
        );

        let first = cached.fetch_content("42").expect("first");
        let second = cached.fetch_content("42").expect("second");
        assert_eq!(first, second);
        assert_eq!(cached.inner.fetches.get(), 1);
        assert!(cached.dir().join("42.wikitext").is_file());
    }

    #[test]
    fn absent_content_is_not_cached() {
        let tmp = tempdir().expect("tempdir");
        let cached = CachedSource::new(
            CountingSource {
                fetches: Cell::new(0),
            },
            tmp.path(),
        );

        assert!(cached.fetch_content("empty").expect("first").is_none());
        assert!(cached.fetch_content("empty").expect("second").is_none());
        assert_eq!(cached.inner.fetches.get(), 2);
    }

    #[test]
    fn namespaces_do_not_collide() {
        let root = Path::new("/cache");
        assert_ne!(namespace_dir(root, "a"), namespace_dir(root, "b"));
        assert_eq!(entry_name("12/3"), "12_3.wikitext");
    }
}
