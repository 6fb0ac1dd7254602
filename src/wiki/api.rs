use crate::error::TocError;
use crate::toc::config::SourceConfig;
use crate::wiki::{
    RevisionMeta, RevisionSource, TimeWindow, format_api_timestamp, parse_api_timestamp,
};
use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

const MAX_LIST_REQUESTS: usize = 200;

pub struct WikiApiSource {
    client: Client,
    api_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionPage {
    pub revisions: Vec<RevisionMeta>,
    pub continue_token: Option<String>,
}

impl WikiApiSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            api_url: cfg.api_url.trim().to_string(),
        })
    }

    fn get_json(&self, params: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(&self.api_url)
            .query(params)
            .send()
            .with_context(|| format!("request to {} failed", self.api_url))?;
        if !response.status().is_success() {
            anyhow::bail!("{} returned status {}", self.api_url, response.status());
        }
        let json: Value = response
            .json()
            .with_context(|| format!("invalid JSON from {}", self.api_url))?;
        if let Some(err) = json.get("error") {
            let code = err.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let info = err.get("info").and_then(Value::as_str).unwrap_or_default();
            anyhow::bail!("api error {code}: {info}");
        }
        Ok(json)
    }
}

fn first_page(json: &Value) -> Option<&Value> {
    let pages = json.get("query")?.get("pages")?;
    match pages {
        Value::Array(items) => items.first(),
        Value::Object(map) => map.values().next(),
        _ => None,
    }
}

fn revision_id(rev: &Value) -> Option<String> {
    rev.get("revid")
        .or_else(|| rev.get("id"))
        .and_then(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
}

/// Reads one `prop=revisions` listing response.
pub fn parse_revision_page(json: &Value, page: &str) -> Result<RevisionPage> {
    let page_obj = first_page(json).ok_or_else(|| anyhow!("response has no query.pages"))?;
    if page_obj.get("missing").is_some() || page_obj.get("invalid").is_some() {
        return Err(anyhow!(TocError::PageNotFound(page.to_string())));
    }

    let mut revisions = Vec::new();
    if let Some(items) = page_obj.get("revisions").and_then(Value::as_array) {
        for rev in items {
            let Some(source_id) = revision_id(rev) else {
                continue;
            };
            let Some(timestamp) = rev
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_api_timestamp)
            else {
                continue;
            };
            revisions.push(RevisionMeta {
                timestamp,
                source_id,
            });
        }
    }

    let continue_token = json
        .get("continue")
        .and_then(|c| c.get("rvcontinue"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    Ok(RevisionPage {
        revisions,
        continue_token,
    })
}

/// Extracts wikitext from a single-revision content response or revision
/// record. Hidden or absent content yields `None`.
pub fn parse_revision_content(json: &Value) -> Option<String> {
    let rev = match first_page(json) {
        Some(page) => page.get("revisions")?.as_array()?.first()?,
        None => json,
    };
    if rev.get("texthidden").and_then(Value::as_bool) == Some(true)
        || rev.get("texthidden").is_some_and(|v| v.as_str() == Some(""))
    {
        return None;
    }

    rev.get("slots")
        .and_then(|slots| slots.get("main"))
        .and_then(|main| main.get("content").or_else(|| main.get("*")))
        .or_else(|| rev.get("content"))
        .or_else(|| rev.get("*"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

impl RevisionSource for WikiApiSource {
    fn describe(&self) -> String {
        self.api_url.clone()
    }

    fn list_revisions(&self, page: &str, window: &TimeWindow) -> Result<Vec<RevisionMeta>> {
        let mut out = Vec::new();
        let mut continue_token: Option<String> = None;

        for _ in 0..MAX_LIST_REQUESTS {
            let mut params = vec![
                ("action", "query".to_string()),
                ("format", "json".to_string()),
                ("formatversion", "2".to_string()),
                ("prop", "revisions".to_string()),
                ("titles", page.to_string()),
                ("rvprop", "ids|timestamp".to_string()),
                ("rvlimit", "max".to_string()),
                ("rvdir", "newer".to_string()),
                ("rvstart", format_api_timestamp(&window.start)),
                ("rvend", format_api_timestamp(&window.end)),
            ];
            if let Some(token) = &continue_token {
                params.push(("rvcontinue", token.clone()));
            }

            let json = self.get_json(&params)?;
            let parsed = parse_revision_page(&json, page)?;
            log::debug!(
                "event=revision_page page={} revisions={} more={}",
                page,
                parsed.revisions.len(),
                parsed.continue_token.is_some()
            );
            out.extend(parsed.revisions);

            match parsed.continue_token {
                Some(token) => continue_token = Some(token),
                None => return Ok(out),
            }
        }

        log::warn!(
            "event=revision_list_truncated page={} revisions={} max_requests={}",
            page,
            out.len(),
            MAX_LIST_REQUESTS
        );
        Ok(out)
    }

    fn fetch_content(&self, source_id: &str) -> Result<Option<String>> {
        let params = [
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
            ("prop", "revisions".to_string()),
            ("revids", source_id.to_string()),
            ("rvprop", "content".to_string()),
            ("rvslots", "main".to_string()),
        ];
        let json = self.get_json(&params)?;
        Ok(parse_revision_content(&json))
    }
}
