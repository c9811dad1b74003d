use std::fmt;

use tracing::{debug, warn};

use crate::query::QueryModel;
use crate::service::{PageResult, ServiceError};
use crate::state::{Status, ViewState};

/// Identity of one issued fetch. Tokens only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    #[cfg(test)]
    pub fn for_tests(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One logical request to the data service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: RequestToken,
    pub query: QueryModel,
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Applied,
    Failed,
    Stale,
}

/// Hands out request tokens and decides which response may touch the view.
#[derive(Debug, Default)]
pub struct FetchOrchestrator {
    last_token: u64,
}

impl FetchOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `query` the current query and issue a request for it. Whatever was
    /// in flight before is superseded.
    pub fn submit(&mut self, view: &mut ViewState, query: QueryModel) -> FetchRequest {
        self.last_token += 1;
        let token = RequestToken(self.last_token);
        if let Some(previous) = view.in_flight() {
            debug!("Request {token} supersedes {previous}");
        }
        view.query = query.clone();
        view.in_flight = Some(token);
        view.status = Status::Loading;
        debug!(
            "Submit {token}: {:?} '{}' page {} ({} per page)",
            query.mode(),
            query.search_text(),
            query.page_number(),
            query.page_size()
        );
        FetchRequest { token, query }
    }

    /// Apply a completed fetch if it is still the current one.
    pub fn complete(
        &mut self,
        view: &mut ViewState,
        token: RequestToken,
        outcome: Result<PageResult, ServiceError>,
    ) -> Commit {
        if view.in_flight() != Some(token) {
            debug!(
                "Dropping stale response {token}, current is {:?}",
                view.in_flight()
            );
            return Commit::Stale;
        }
        view.in_flight = None;
        match outcome {
            Ok(page) => {
                debug!(
                    "Commit {token}: {} rows of {}",
                    page.rows.len(),
                    page.total_records
                );
                view.result = Some(page);
                view.status = Status::Idle;
                view.error_detail = None;
                Commit::Applied
            }
            Err(e) => {
                warn!("Request {token} failed: {e}");
                view.result = Some(PageResult::empty());
                view.status = Status::Error;
                view.error_detail = Some(e.to_string());
                Commit::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{CellValue, Row};

    fn page(marker: &str, total: u64) -> PageResult {
        let row: Row = [("id".to_string(), Some(CellValue::Text(marker.into())))]
            .into_iter()
            .collect();
        PageResult {
            rows: vec![row],
            total_records: total,
        }
    }

    fn failure() -> ServiceError {
        ServiceError::Status {
            status: 500,
            message: "Failed to get data".into(),
        }
    }

    #[test]
    fn submit_marks_loading_with_fresh_tokens() {
        let mut orch = FetchOrchestrator::new();
        let mut view = ViewState::new();

        let r1 = orch.submit(&mut view, QueryModel::initial());
        assert_eq!(view.status(), Status::Loading);
        assert_eq!(view.in_flight(), Some(r1.token));

        let r2 = orch.submit(&mut view, QueryModel::initial().with_page(2));
        assert!(r2.token > r1.token);
        assert_eq!(view.in_flight(), Some(r2.token));
        assert_eq!(view.query().page_number(), 2);
    }

    #[test]
    fn late_response_of_superseded_request_is_dropped() {
        let mut orch = FetchOrchestrator::new();
        let mut view = ViewState::new();

        let r1 = orch.submit(&mut view, QueryModel::initial().with_page(2));
        let r2 = orch.submit(&mut view, QueryModel::initial().with_search_text("alice"));

        assert_eq!(
            orch.complete(&mut view, r2.token, Ok(page("r2", 1))),
            Commit::Applied
        );
        assert_eq!(
            orch.complete(&mut view, r1.token, Ok(page("r1", 500))),
            Commit::Stale
        );

        assert_eq!(view.status(), Status::Idle);
        assert_eq!(view.result(), Some(&page("r2", 1)));
        assert_eq!(view.query().search_text(), "alice");
    }

    #[test]
    fn stale_response_leaves_loading_untouched() {
        let mut orch = FetchOrchestrator::new();
        let mut view = ViewState::new();

        let r1 = orch.submit(&mut view, QueryModel::initial());
        let r2 = orch.submit(&mut view, QueryModel::initial().with_page(2));

        assert_eq!(orch.complete(&mut view, r1.token, Err(failure())), Commit::Stale);
        assert_eq!(view.status(), Status::Loading);
        assert_eq!(view.in_flight(), Some(r2.token));
        assert!(view.result().is_none());
        assert!(view.error_detail().is_none());
    }

    #[test]
    fn failure_clears_result_and_sets_error() {
        let mut orch = FetchOrchestrator::new();
        let mut view = ViewState::new();

        let r1 = orch.submit(&mut view, QueryModel::initial());
        orch.complete(&mut view, r1.token, Ok(page("old", 120)));

        let r2 = orch.submit(&mut view, QueryModel::initial().with_page(2));
        assert_eq!(orch.complete(&mut view, r2.token, Err(failure())), Commit::Failed);

        assert_eq!(view.status(), Status::Error);
        assert_eq!(view.result(), Some(&PageResult::empty()));
        assert!(view.error_detail().unwrap().contains("Failed to get data"));
        assert_eq!(view.in_flight(), None);
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let mut orch = FetchOrchestrator::new();
        let mut view = ViewState::new();

        let r1 = orch.submit(&mut view, QueryModel::initial());
        orch.complete(&mut view, r1.token, Ok(page("first", 1)));
        assert_eq!(
            orch.complete(&mut view, r1.token, Ok(page("again", 2))),
            Commit::Stale
        );
        assert_eq!(view.result(), Some(&page("first", 1)));
    }
}
