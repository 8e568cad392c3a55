//! `Link` header pagination.

use deploykeys_shared::pagination::ApiOptions;

use crate::connection::ApiResponse;

/// Target of the `rel="next"` relation, if the response has one.
pub fn next_page_url(response: &ApiResponse) -> Option<String> {
    response
        .headers
        .get_all(reqwest::header::LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| find_relation(v, "next"))
}

fn find_relation(header: &str, relation: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let matches = parts.any(|param| {
            let Some((key, value)) = param.split_once('=') else {
                return false;
            };
            key.trim() == "rel"
                && value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|r| r == relation)
        });
        matches.then(|| target.to_string())
    })
}

/// Counts fetched pages against an optional page cap.
#[derive(Debug, Clone, Copy)]
pub struct PageCursor {
    fetched: u32,
    limit: Option<u32>,
}

impl PageCursor {
    pub fn new(options: &ApiOptions) -> Self {
        Self {
            fetched: 0,
            limit: options.page_count,
        }
    }

    pub fn record_page(&mut self) {
        self.fetched += 1;
    }

    pub fn fetched(&self) -> u32 {
        self.fetched
    }

    pub fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.fetched >= limit)
    }
}
