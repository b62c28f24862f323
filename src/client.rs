//! Confluence REST API client.
//!
//! Thin request/response layer over the v1 content endpoints. Every
//! request carries basic auth (account email + API token) and JSON
//! `Accept`/`Content-Type` headers. One network attempt per call: retry
//! policy belongs to the caller.
//!
//! # Endpoints
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `GET` | `/wiki/rest/api/search?cql=&limit=&expand=` | [`ConfluenceClient::search`] |
//! | `GET` | `/wiki/rest/api/content/{id}?expand=` | [`ConfluenceClient::get_page`] |
//! | `GET` | `/wiki/rest/api/content?spaceKey=&limit=&expand=` | [`ConfluenceClient::list_space_pages`] |

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;

use confluence_harness_core::models::{Page, PageList, SearchResult};

use crate::error::ConnectorError;

/// Request timeout when [`ClientConfig::timeout`] is unset or zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result limit when the caller passes zero or a negative value.
pub const DEFAULT_LIMIT: i64 = 25;

const API_PATH: [&str; 3] = ["wiki", "rest", "api"];

const PAGE_EXPAND: &str = "body.storage,body.view,space,version";
const SEARCH_EXPAND: &str = "content.body.storage,content.body.view,content.space,content.version";

/// Connection settings for a [`ConfluenceClient`].
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub timeout: Option<Duration>,
}

/// Authenticated client for one Confluence site.
pub struct ConfluenceClient {
    base_url: String,
    email: String,
    api_token: String,
    http: reqwest::Client,
}

impl ConfluenceClient {
    /// Build a client. Fails only if the HTTP stack cannot be initialized.
    pub fn new(config: ClientConfig) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .timeout(effective_timeout(config.timeout))
            .build()
            .map_err(ConnectorError::Transport)?;

        Ok(Self {
            base_url: config.base_url,
            email: config.email,
            api_token: config.api_token,
            http,
        })
    }

    /// Run a CQL query, returning up to `limit` hits with their pages expanded.
    pub async fn search(&self, cql: &str, limit: i64) -> Result<SearchResult, ConnectorError> {
        let limit = effective_limit(limit).to_string();
        self.get_json(
            &["search"],
            &[("cql", cql), ("limit", &limit), ("expand", SEARCH_EXPAND)],
        )
        .await
    }

    /// Fetch one page by id. The id is sent as a single escaped path segment.
    pub async fn get_page(&self, page_id: &str) -> Result<Page, ConnectorError> {
        self.get_json(&["content", page_id], &[("expand", PAGE_EXPAND)])
            .await
    }

    /// List up to `limit` pages of a space.
    pub async fn list_space_pages(
        &self,
        space_key: &str,
        limit: i64,
    ) -> Result<Vec<Page>, ConnectorError> {
        let limit = effective_limit(limit).to_string();
        let list: PageList = self
            .get_json(
                &["content"],
                &[
                    ("spaceKey", space_key),
                    ("limit", &limit),
                    ("expand", PAGE_EXPAND),
                ],
            )
            .await?;
        Ok(list.results)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ConnectorError> {
        let mut req = self
            .http
            .get(&self.base_url)
            .query(query)
            .basic_auth(&self.email, Some(&self.api_token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .build()
            .map_err(ConnectorError::Transport)?;

        // Cannot-be-a-base URLs have no segments; `execute` rejects their scheme.
        if let Ok(mut path) = req.url_mut().path_segments_mut() {
            path.pop_if_empty().extend(API_PATH).extend(segments);
        }
        let path = req.url().path().to_string();

        let resp = self
            .http
            .execute(req)
            .await
            .map_err(ConnectorError::Transport)?;

        let status = resp.status();
        debug!(method = "GET", path = %path, status = status.as_u16(), "confluence request");

        let body = resp.text().await.map_err(ConnectorError::Transport)?;
        if !status.is_success() {
            return Err(ConnectorError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(ConnectorError::Decode)
    }
}

fn effective_timeout(timeout: Option<Duration>) -> Duration {
    timeout
        .filter(|t| !t.is_zero())
        .unwrap_or(DEFAULT_TIMEOUT)
}

fn effective_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(0), 25);
        assert_eq!(effective_limit(-3), 25);
        assert_eq!(effective_limit(7), 7);
    }

    #[test]
    fn test_zero_timeout_means_default() {
        assert_eq!(effective_timeout(None), DEFAULT_TIMEOUT);
        assert_eq!(effective_timeout(Some(Duration::ZERO)), DEFAULT_TIMEOUT);
        assert_eq!(
            effective_timeout(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
    }
}
