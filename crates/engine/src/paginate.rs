//! Paginator: drive a paged search to a target record count.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::error::{PipelineError, RemoteError};
use crate::retry::RetryFailure;

/// One page as returned by the search collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub records: Vec<Value>,
    /// Provider's own "more pages" signal, when it sends one.
    pub has_more: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// First page to fetch (1-based).
    pub start_page: u32,
    pub page_size: u32,
    /// Records wanted. `None` fetches exactly one page.
    pub target: Option<usize>,
}

impl PageRequest {
    pub fn single(page: u32, page_size: u32) -> Self {
        Self { start_page: page.max(1), page_size, target: None }
    }

    pub fn until(target: usize, page_size: u32) -> Self {
        Self { start_page: 1, page_size, target: Some(target) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    pub page: u32,
    pub page_size: u32,
    pub collected: usize,
    pub target: Option<usize>,
}

impl PaginationCursor {
    fn remaining(&self) -> Option<usize> {
        self.target.map(|t| t.saturating_sub(self.collected))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    Exhausted,
    SinglePage,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub records: Vec<Value>,
    pub pages_fetched: u32,
    pub target: Option<usize>,
    pub stop: StopReason,
    /// Set when a page after the first failed terminally.
    pub failure: Option<RetryFailure>,
}

impl Collected {
    pub fn meta(&self) -> Value {
        let mut meta = json!({
            "total_requested": self.target,
            "total_collected": self.records.len(),
            "pages_fetched": self.pages_fetched,
        });
        if let Some(f) = &self.failure {
            meta["error"] = json!(f.to_string());
        }
        meta
    }
}

/// Fetch pages until the target is met or the provider runs dry.
///
/// Every request uses the same `page_size`; the last page is truncated to
/// land exactly on the target. A failure on the first page is returned as an
/// error. A later failure ends collection with the records gathered so far.
pub fn collect<F>(
    mut fetch: F,
    request: PageRequest,
    ctx: &RunContext,
) -> Result<Collected, PipelineError>
where
    F: FnMut(u32, u32) -> Result<SearchPage, RemoteError>,
{
    if request.target == Some(0) {
        return Err(PipelineError::InvalidTarget);
    }

    let page_size = request.page_size.max(1);
    let mut cursor = PaginationCursor {
        page: request.start_page.max(1),
        page_size,
        collected: 0,
        target: request.target,
    };
    let mut records: Vec<Value> = Vec::new();
    let mut pages_fetched = 0u32;
    let mut failure = None;

    let stop = loop {
        if ctx.cancel.is_cancelled() {
            if pages_fetched == 0 {
                return Err(PipelineError::Cancelled);
            }
            break StopReason::Cancelled;
        }

        let page = match ctx.attempt("search", |_| fetch(cursor.page, page_size)) {
            Ok(page) => page,
            Err(f) if !f.error.is_auth() && ctx.cancel.is_cancelled() => {
                if pages_fetched == 0 {
                    return Err(PipelineError::Cancelled);
                }
                break StopReason::Cancelled;
            }
            Err(f) if pages_fetched == 0 || f.error.is_auth() => {
                return Err(PipelineError::from_first_page(f));
            }
            Err(f) => {
                warn!("page {} failed, keeping {} records: {}", cursor.page, cursor.collected, f);
                failure = Some(f);
                break StopReason::Failed;
            }
        };

        pages_fetched += 1;
        let returned = page.records.len();
        let mut page_records = page.records;
        if let Some(room) = cursor.remaining() {
            page_records.truncate(room);
        }
        cursor.collected += page_records.len();
        records.extend(page_records);

        if let Some(target) = cursor.target {
            info!("Fetched page {} ({}/{} records)", cursor.page, cursor.collected, target);
        }

        match cursor.remaining() {
            None => break StopReason::SinglePage,
            Some(0) => break StopReason::TargetReached,
            Some(_) => {}
        }
        if returned < page_size as usize || page.has_more == Some(false) {
            break StopReason::Exhausted;
        }
        cursor.page += 1;
    };

    Ok(Collected {
        records,
        pages_fetched,
        target: request.target,
        stop,
        failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, start: usize) -> SearchPage {
        SearchPage {
            records: (start..start + n).map(|i| json!({ "i": i })).collect(),
            has_more: None,
        }
    }

    #[test]
    fn single_page_without_target() {
        let ctx = RunContext::default();
        let mut calls = Vec::new();
        let out = collect(
            |p, s| {
                calls.push((p, s));
                Ok(page(s as usize, 0))
            },
            PageRequest::single(3, 25),
            &ctx,
        )
        .unwrap();
        assert_eq!(calls, vec![(3, 25)]);
        assert_eq!(out.records.len(), 25);
        assert_eq!(out.stop, StopReason::SinglePage);
    }

    #[test]
    fn short_page_means_exhausted() {
        let ctx = RunContext::default();
        let out = collect(
            |p, _| Ok(if p == 1 { page(10, 0) } else { page(4, 10) }),
            PageRequest::until(100, 10),
            &ctx,
        )
        .unwrap();
        assert_eq!(out.records.len(), 14);
        assert_eq!(out.pages_fetched, 2);
        assert_eq!(out.stop, StopReason::Exhausted);
    }

    #[test]
    fn has_more_false_stops() {
        let ctx = RunContext::default();
        let out = collect(
            |_, s| Ok(SearchPage { has_more: Some(false), ..page(s as usize, 0) }),
            PageRequest::until(100, 10),
            &ctx,
        )
        .unwrap();
        assert_eq!(out.pages_fetched, 1);
        assert_eq!(out.stop, StopReason::Exhausted);
    }

    #[test]
    fn zero_target_rejected() {
        let ctx = RunContext::default();
        let err = collect(|_, _| Ok(page(1, 0)), PageRequest::until(0, 10), &ctx).unwrap_err();
        assert_eq!(err, PipelineError::InvalidTarget);
    }

    #[test]
    fn meta_reports_counts() {
        let ctx = RunContext::default();
        let out = collect(|_, s| Ok(page(s as usize, 0)), PageRequest::until(15, 10), &ctx).unwrap();
        assert_eq!(
            out.meta(),
            json!({ "total_requested": 15, "total_collected": 15, "pages_fetched": 2 })
        );
    }
}
