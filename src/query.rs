use crate::domain::PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Browse,
    Search,
}

/// What to fetch from the server. A new value is built for every page or
/// search text change, existing values are never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryModel {
    mode: QueryMode,
    search_text: String,
    page_number: u64,
    page_size: u64,
}

impl Default for QueryModel {
    fn default() -> Self {
        Self::initial()
    }
}

impl QueryModel {
    /// Browse mode, first page.
    pub fn initial() -> Self {
        Self {
            mode: QueryMode::Browse,
            search_text: String::new(),
            page_number: 1,
            page_size: PAGE_SIZE,
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Same filter, different page. Pages below 1 are lifted to 1.
    pub fn with_page(&self, page_number: u64) -> Self {
        Self {
            page_number: page_number.max(1),
            ..self.clone()
        }
    }

    /// New filter text. Always starts over on page 1 since the old page may
    /// not exist under the new total.
    pub fn with_search_text(&self, text: &str) -> Self {
        let mode = if text.is_empty() {
            QueryMode::Browse
        } else {
            QueryMode::Search
        };
        Self {
            mode,
            search_text: text.to_string(),
            page_number: 1,
            page_size: self.page_size,
        }
    }
}
