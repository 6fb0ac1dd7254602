use crate::error::TocError;
use crate::toc::assembler::{Assembler, AssemblerConfig, FeedOutcome, History, RevisionInput};
use crate::toc::warn;
use crate::wiki::{RevisionSource, TimeWindow};
use anyhow::{Result, anyhow};

#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub history: History,
    pub listed: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub skipped: usize,
}

/// Lists the page's revisions in `window`, fetches the ones the sampling
/// policy could keep, and assembles the history.
///
/// A failed listing is fatal. A failed fetch only loses that revision; the
/// run fails when nothing at all could be retained.
pub fn reconstruct<S: RevisionSource + ?Sized>(
    source: &S,
    page: &str,
    window: &TimeWindow,
    cfg: &AssemblerConfig,
) -> Result<Reconstruction> {
    let mut metas = match source.list_revisions(page, window) {
        Ok(metas) => metas,
        Err(err) => {
            let not_found = matches!(
                err.downcast_ref::<TocError>(),
                Some(TocError::PageNotFound(_))
            );
            if not_found {
                return Err(err);
            }
            return Err(anyhow!(TocError::RetrievalFailure(format!(
                "listing revisions of `{page}` from {}: {err:#}",
                source.describe()
            ))));
        }
    };
    metas.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    log::info!(
        "event=revisions_listed page={} count={} source={}",
        page,
        metas.len(),
        source.describe()
    );

    let mut assembler = Assembler::new(cfg.clone());
    let mut fetched = 0usize;
    let mut fetch_failures = 0usize;
    let mut skipped = 0usize;

    for meta in &metas {
        if !assembler.wants(&meta.timestamp) {
            continue;
        }
        let text = match source.fetch_content(&meta.source_id) {
            Ok(text) => {
                fetched += 1;
                text
            }
            Err(err) => {
                fetch_failures += 1;
                warn::emit(
                    "fetch_failed",
                    "fetch",
                    &meta.source_id,
                    "content unavailable",
                    &format!("{err:#}"),
                );
                continue;
            }
        };

        let outcome = assembler.feed(RevisionInput {
            timestamp: meta.timestamp,
            source_id: meta.source_id.clone(),
            text,
        });
        match outcome {
            FeedOutcome::Retained { key } => {
                log::info!(
                    "event=snapshot_retained key={} source_id={}",
                    key,
                    meta.source_id
                );
            }
            FeedOutcome::Skipped(reason) => {
                skipped += 1;
                warn::emit("parse_skip", "assemble", &meta.source_id, reason.label(), "");
            }
            FeedOutcome::Processed { significance } => {
                log::debug!(
                    "event=snapshot_below_threshold source_id={} significance={}",
                    meta.source_id,
                    significance
                );
            }
            FeedOutcome::NotWanted | FeedOutcome::Closed => {}
        }
    }

    let history = assembler.finish();
    if history.is_empty() {
        if fetched == 0 && fetch_failures > 0 {
            return Err(anyhow!(TocError::RetrievalFailure(format!(
                "all {fetch_failures} content fetches for `{page}` failed"
            ))));
        }
        return Err(anyhow!(TocError::NoUsableSnapshots {
            page: page.to_string()
        }));
    }

    Ok(Reconstruction {
        history,
        listed: metas.len(),
        fetched,
        fetch_failures,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toc::config::SamplingMode;
    use crate::toc::rename::RenameDetectionConfig;
    use crate::wiki::RevisionMeta;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;
    use std::cell::RefCell;

    struct FakeSource {
        revisions: Vec<(RevisionMeta, Result<Option<String>, String>)>,
        fetched: RefCell<Vec<String>>,
        list_error: bool,
    }

    impl FakeSource {
        fn new(list_error: bool) -> Self {
            Self {
                revisions: Vec::new(),
                fetched: RefCell::new(Vec::new()),
                list_error,
            }
        }

        fn with(mut self, year: i32, month: u32, id: &str, content: Result<Option<&str>, &str>) -> Self {
            let meta = RevisionMeta {
                timestamp: Utc
                    .with_ymd_and_hms(year, month, 1, 0, 0, 0)
                    .single()
                    .expect("ts"),
                source_id: id.to_string(),
            };
            let content = content
                .map(|c| c.map(ToOwned::to_owned))
                .map_err(ToOwned::to_owned);
            self.revisions.push((meta, content));
            self
        }
    }

    impl RevisionSource for FakeSource {
        fn describe(&self) -> String {
            "fake".to_string()
        }

        fn list_revisions(&self, _page: &str, _window: &TimeWindow) -> Result<Vec<RevisionMeta>> {
            if self.list_error {
                anyhow::bail!("connection refused");
            }
            // newest first, to check the driver sorts
            Ok(self.revisions.iter().rev().map(|(m, _)| m.clone()).collect())
        }

        fn fetch_content(&self, source_id: &str) -> Result<Option<String>> {
            self.fetched.borrow_mut().push(source_id.to_string());
            let (_, content) = self
                .revisions
                .iter()
                .find(|(m, _)| m.source_id == source_id)
                .ok_or_else(|| anyhow!("unknown id"))?;
            content.clone().map_err(|e| anyhow!(e))
        }
    }

    fn cfg() -> AssemblerConfig {
        AssemblerConfig {
            mode: SamplingMode::Yearly,
            start_year: 2019,
            end_year: 2021,
            significance_threshold: 5.0,
            timezone: Tz::UTC,
            rename: RenameDetectionConfig::default(),
            marker: '=',
        }
    }

    fn window() -> TimeWindow {
        TimeWindow::from_years(2019, 2021, Tz::UTC).expect("window")
    }

    #[test]
    fn yearly_run_fetches_only_candidates() {
        let source = FakeSource::new(false)
            .with(2019, 1, "1", Ok(Some("==A==")))
            .with(2019, 5, "2", Ok(Some("==A==\n==B==")))
            .with(2020, 1, "3", Err("timeout"))
            .with(2020, 2, "4", Ok(Some("==A==\n==C==")));

        let out = reconstruct(&source, "Page", &window(), &cfg()).expect("reconstruct");
        assert_eq!(out.listed, 4);
        assert_eq!(out.fetched, 2);
        assert_eq!(out.fetch_failures, 1);
        assert_eq!(out.history.len(), 2);
        assert_eq!(*source.fetched.borrow(), vec!["1", "3", "4"]);
        assert_eq!(out.history.get("2020").expect("2020").source_id, "4");
    }

    #[test]
    fn list_failure_is_retrieval_failure() {
        let source = FakeSource::new(true);
        let err = reconstruct(&source, "Page", &window(), &cfg()).expect_err("fails");
        assert!(matches!(
            err.downcast_ref::<TocError>(),
            Some(TocError::RetrievalFailure(_))
        ));
    }

    #[test]
    fn all_fetches_failing_is_retrieval_failure() {
        let source = FakeSource::new(false)
            .with(2019, 1, "1", Err("boom"))
            .with(2020, 1, "2", Err("boom"));
        let err = reconstruct(&source, "Page", &window(), &cfg()).expect_err("fails");
        assert!(matches!(
            err.downcast_ref::<TocError>(),
            Some(TocError::RetrievalFailure(_))
        ));
    }

    #[test]
    fn nothing_parseable_is_no_usable_snapshots() {
        let source = FakeSource::new(false)
            .with(2019, 1, "1", Ok(None))
            .with(2020, 1, "2", Ok(Some("no headings here")));
        let err = reconstruct(&source, "Page", &window(), &cfg()).expect_err("fails");
        assert!(matches!(
            err.downcast_ref::<TocError>(),
            Some(TocError::NoUsableSnapshots { .. })
        ));
    }
}
