use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Paging controls for list operations.
///
/// Every field is optional. With all fields unset a listing walks every page
/// the server offers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiOptions {
    /// Items per page, sent as `per_page`.
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Maximum number of pages to fetch.
    #[serde(default)]
    pub page_count: Option<u32>,
    /// First page to fetch, sent as `page`.
    #[serde(default)]
    pub start_page: Option<u32>,
}

impl ApiOptions {
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page_count(mut self, page_count: u32) -> Self {
        self.page_count = Some(page_count);
        self
    }

    pub fn start_page(mut self, start_page: u32) -> Self {
        self.start_page = Some(start_page);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.page_count.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("page_size", self.page_size),
            ("page_count", self.page_count),
            ("start_page", self.start_page),
        ] {
            if value == Some(0) {
                return Err(ValidationError::new(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Query parameters for the first page request.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(size) = self.page_size {
            query.push(("per_page".to_string(), size.to_string()));
        }
        if let Some(page) = self.start_page {
            query.push(("page".to_string(), page.to_string()));
        }
        query
    }
}
