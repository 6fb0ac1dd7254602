use crate::error::TocError;
use crate::wiki::api::parse_revision_content;
use crate::wiki::{RevisionMeta, RevisionSource, TimeWindow, parse_api_timestamp};
use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct DumpRevision {
    meta: RevisionMeta,
    content: Option<String>,
}

/// Offline revisions read from a JSON5 file: either a bare array of revision
/// records or an object with `title` and `revisions`.
#[derive(Debug, Clone)]
pub struct DumpSource {
    path: PathBuf,
    title: Option<String>,
    revisions: Vec<DumpRevision>,
    by_id: BTreeMap<String, usize>,
}

fn normalize_title(raw: &str) -> String {
    raw.trim().replace('_', " ").to_lowercase()
}

fn record_id(rec: &Value, index: usize) -> String {
    match rec.get("revid").or_else(|| rec.get("id")) {
        Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(int), _) => int.to_string(),
            // JSON5 readers may hand whole numbers back as floats
            (None, Some(f)) if f.fract() == 0.0 && f >= 0.0 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => format!("dump-{index}"),
    }
}

impl DumpSource {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self> {
        let doc: Value = json5::from_str(raw)
            .map_err(|err| anyhow!("invalid revision dump {}: {err}", path.display()))?;

        let (title, records) = match &doc {
            Value::Array(items) => (None, items.as_slice()),
            Value::Object(map) => {
                let title = map
                    .get("title")
                    .or_else(|| map.get("page"))
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned);
                let items = map
                    .get("revisions")
                    .and_then(Value::as_array)
                    .ok_or_else(|| anyhow!("{} has no `revisions` array", path.display()))?;
                (title, items.as_slice())
            }
            _ => anyhow::bail!("{} must hold an array or object", path.display()),
        };

        let mut revisions = Vec::with_capacity(records.len());
        let mut by_id = BTreeMap::new();
        for (index, rec) in records.iter().enumerate() {
            let Some(timestamp) = rec
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_api_timestamp)
            else {
                log::debug!("event=dump_record_skipped index={index} reason=bad_timestamp");
                continue;
            };
            let source_id = record_id(rec, index);
            if by_id.contains_key(&source_id) {
                log::debug!("event=dump_record_skipped index={index} reason=duplicate_id");
                continue;
            }
            by_id.insert(source_id.clone(), revisions.len());
            revisions.push(DumpRevision {
                meta: RevisionMeta {
                    timestamp,
                    source_id,
                },
                content: parse_revision_content(rec),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            title,
            revisions,
            by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }
}

impl RevisionSource for DumpSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn list_revisions(&self, page: &str, window: &TimeWindow) -> Result<Vec<RevisionMeta>> {
        if let Some(title) = &self.title
            && normalize_title(title) != normalize_title(page)
        {
            return Err(anyhow!(TocError::PageNotFound(page.to_string())))
                .with_context(|| format!("{} holds revisions of `{title}`", self.describe()));
        }

        let mut out: Vec<RevisionMeta> = self
            .revisions
            .iter()
            .filter(|rev| window.contains(&rev.meta.timestamp))
            .map(|rev| rev.meta.clone())
            .collect();
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(out)
    }

    fn fetch_content(&self, source_id: &str) -> Result<Option<String>> {
        let idx = self
            .by_id
            .get(source_id)
            .ok_or_else(|| anyhow!("revision {source_id} not in {}", self.describe()))?;
        Ok(self.revisions[*idx].content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;
    use tempfile::tempdir;

    const DUMP: &str = r#"
// trailing commas and comments are fine
{
  title: "Example_page",
  revisions: [
    { revid: 3, timestamp: "2021-05-01T00:00:00Z", content: "==Later==" },
    { revid: 1, timestamp: "2019-01-02T00:00:00Z", "*": "==First==" },
    { revid: 2, timestamp: "2020-03-01T00:00:00Z", slots: { main: { content: "==Second==" } } },
    { revid: 4, timestamp: "garbage", content: "==Lost==" },
    { revid: 5, timestamp: "2020-06-01T00:00:00Z" },
  ],
}
"#;

    fn load() -> DumpSource {
        DumpSource::parse(DUMP, Path::new("inline.json5")).expect("dump")
    }

    #[test]
    fn listing_filters_window_and_sorts() {
        let source = load();
        assert_eq!(source.len(), 4);
        let window = TimeWindow::from_years(2019, 2020, Tz::UTC).expect("window");
        let ids: Vec<String> = source
            .list_revisions("Example page", &window)
            .expect("list")
            .into_iter()
            .map(|m| m.source_id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "5"]);
    }

    #[test]
    fn content_comes_from_any_supported_key() {
        let source = load();
        assert_eq!(source.fetch_content("1").expect("1").as_deref(), Some("==First=="));
        assert_eq!(source.fetch_content("2").expect("2").as_deref(), Some("==Second=="));
        assert!(source.fetch_content("5").expect("5").is_none());
        assert!(source.fetch_content("99").is_err());
    }

    #[test]
    fn other_page_is_not_found() {
        let source = load();
        let window = TimeWindow::from_years(2019, 2021, Tz::UTC).expect("window");
        let err = source.list_revisions("Other", &window).expect_err("mismatch");
        assert!(err.downcast_ref::<TocError>().is_some());
    }

    #[test]
    fn bare_array_loads_from_disk() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("revs.json5");
        fs::write(
            &path,
            r#"[{ id: "a", timestamp: "2020-01-01T00:00:00Z", content: "==A==" }]"#,
        )
        .expect("write");
        let source = DumpSource::load(&path).expect("load");
        let window = TimeWindow::from_years(2020, 2020, Tz::UTC).expect("window");
        assert_eq!(source.list_revisions("anything", &window).expect("list").len(), 1);
    }
}
