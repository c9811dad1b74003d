use crate::orchestrator::RequestToken;
use crate::pagination::compute_total_pages;
use crate::query::{QueryMode, QueryModel};
use crate::service::{DatasetDescriptor, PageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Error,
}

/// What the table area should currently tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    NoDataset,
    Loading,
    Failed(String),
    NoData,
    NoResults,
    Rows,
}

/// The single mutable view of the remote dataset.
///
/// Only the fetch orchestrator (commit) and the dataset lifecycle (reset)
/// write to it, both from the event loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub(crate) dataset: Option<DatasetDescriptor>,
    pub(crate) query: QueryModel,
    pub(crate) result: Option<PageResult>,
    pub(crate) status: Status,
    pub(crate) error_detail: Option<String>,
    pub(crate) in_flight: Option<RequestToken>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            dataset: None,
            query: QueryModel::initial(),
            result: None,
            status: Status::Idle,
            error_detail: None,
            in_flight: None,
        }
    }

    pub fn dataset(&self) -> Option<&DatasetDescriptor> {
        self.dataset.as_ref()
    }

    pub fn query(&self) -> &QueryModel {
        &self.query
    }

    pub fn result(&self) -> Option<&PageResult> {
        self.result.as_ref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn in_flight(&self) -> Option<RequestToken> {
        self.in_flight
    }

    pub fn headers(&self) -> &[String] {
        self.dataset
            .as_ref()
            .map(|d| d.headers.as_slice())
            .unwrap_or_default()
    }

    pub fn total_records(&self) -> u64 {
        self.result.as_ref().map_or(0, |r| r.total_records)
    }

    /// Page count of the last accepted result, 0 before any successful fetch.
    pub fn total_pages(&self) -> u64 {
        compute_total_pages(self.total_records(), self.query.page_size())
    }

    /// Drop everything fetched so far and start over with the initial query.
    /// Any request still in flight becomes stale.
    pub(crate) fn reset(&mut self, dataset: Option<DatasetDescriptor>) {
        *self = Self {
            dataset,
            ..Self::new()
        };
    }

    pub fn presentation(&self) -> Presentation {
        if self.dataset.is_none() {
            return Presentation::NoDataset;
        }
        match (self.status, self.result.as_ref()) {
            (Status::Error, _) => {
                Presentation::Failed(self.error_detail().unwrap_or_default().to_string())
            }
            (Status::Loading, None) => Presentation::Loading,
            (Status::Loading, Some(r)) if r.rows.is_empty() => Presentation::Loading,
            (_, Some(r)) if !r.rows.is_empty() => Presentation::Rows,
            (Status::Idle, None) => Presentation::Loading,
            _ => match self.query.mode() {
                QueryMode::Search => Presentation::NoResults,
                QueryMode::Browse => Presentation::NoData,
            },
        }
    }
}
