//! Orchestrated operations: fetch, filter, normalize, store.
//!
//! Each operation is a single-shot sequence with no state kept between
//! invocations. The Confluence client is built fresh from the supplied
//! [`Credentials`] on every call, and any failure aborts the whole
//! operation before anything is stored.
//!
//! | Operation | Fetch | Store |
//! |-----------|-------|-------|
//! | [`fetch_pages`] | list pages of a space, drop revisions older than `since` | yes |
//! | [`fetch_page`] | one page by id | no |
//! | [`search_cql`] | CQL search | yes |
//!
//! Both the fetch and the store call race against the caller's
//! [`ActivityContext`]; if it is cancelled or its deadline passes, the
//! outstanding call is dropped and the operation fails with
//! [`ConnectorError::Cancelled`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use confluence_harness_core::models::Document;
use confluence_harness_core::normalize::{page_to_document, retain_since};
use confluence_harness_core::store::{DataRef, DocumentStore};

use crate::client::{ClientConfig, ConfluenceClient};
use crate::error::{ActivityError, ConnectorError, Step};

pub const FETCH_PAGES: &str = "fetch-pages";
pub const FETCH_PAGE: &str = "fetch-page";
pub const SEARCH_BY_QUERY: &str = "search-by-query";

/// Result limit for the batch operations when the caller gives none.
pub const DEFAULT_ACTIVITY_LIMIT: i64 = 100;

// ═══════════════════════════════════════════════════════════════════════
// Inputs and outputs
// ═══════════════════════════════════════════════════════════════════════

/// Site address and account credentials shared by every operation input.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Credentials {
    fn client(&self) -> Result<ConfluenceClient, ConnectorError> {
        ConfluenceClient::new(ClientConfig {
            base_url: self.base_url.clone(),
            email: self.email.clone(),
            api_token: self.api_token.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchPagesInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub space_key: String,
    /// Keep only pages whose current version was created at or after this instant.
    #[serde(default, deserialize_with = "deserialize_since")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchPagesOutput {
    pub data_ref: DataRef,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchPageInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub page_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchPageOutput {
    pub document: Document,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchCqlInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub cql: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchCqlOutput {
    pub data_ref: DataRef,
    pub count: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Cancellation
// ═══════════════════════════════════════════════════════════════════════

/// Caller-supplied cancellation signal and deadline for one invocation.
///
/// The default context never cancels.
#[derive(Clone, Default)]
pub struct ActivityContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Fires the cancellation of the [`ActivityContext`] it was created with.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl ActivityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context plus the handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: Some(rx),
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Never resolves for the default context.
    async fn done(&self) {
        let signal = async {
            match &self.cancel {
                Some(rx) => {
                    let mut rx = rx.clone();
                    // Sender dropped without cancelling: never fires.
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = signal => {}
            _ = deadline => {}
        }
    }

    /// Drive `fut` to completion unless the context fires first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ConnectorError>
    where
        F: Future<Output = Result<T, ConnectorError>>,
    {
        tokio::select! {
            biased;
            _ = self.done() => Err(ConnectorError::Cancelled),
            res = fut => res,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════════════════

/// List the pages of a space, keep those at or after `since`, normalize
/// them, and store the batch.
///
/// The store call is made even when no page survives the filter; the
/// result is then an empty batch with `count == 0`.
pub async fn fetch_pages(
    ctx: &ActivityContext,
    store: &dyn DocumentStore,
    input: FetchPagesInput,
) -> Result<FetchPagesOutput, ActivityError> {
    debug!(space_key = %input.space_key, since = ?input.since, "fetching space pages");

    let client = input
        .credentials
        .client()
        .map_err(fail(FETCH_PAGES, Step::Fetch))?;
    let limit = activity_limit(input.limit);

    let pages = ctx
        .run(client.list_space_pages(&input.space_key, limit))
        .await
        .map_err(fail(FETCH_PAGES, Step::Fetch))?;
    let fetched = pages.len();

    let docs: Vec<Document> = retain_since(pages, input.since)
        .iter()
        .map(|page| page_to_document(page, &input.credentials.base_url))
        .collect();

    let data_ref = store_batch(ctx, store, &docs)
        .await
        .map_err(fail(FETCH_PAGES, Step::Store))?;

    info!(
        space_key = %input.space_key,
        fetched,
        stored = docs.len(),
        data_ref = %data_ref,
        "stored space pages"
    );

    Ok(FetchPagesOutput {
        count: docs.len(),
        data_ref,
    })
}

/// Fetch one page and return its document without storing it.
///
/// A missing page surfaces as the API's error (typically a 404
/// [`ConnectorError::RemoteApi`]).
pub async fn fetch_page(
    ctx: &ActivityContext,
    input: FetchPageInput,
) -> Result<FetchPageOutput, ActivityError> {
    debug!(page_id = %input.page_id, "fetching page");

    let client = input
        .credentials
        .client()
        .map_err(fail(FETCH_PAGE, Step::Fetch))?;

    let page = ctx
        .run(client.get_page(&input.page_id))
        .await
        .map_err(fail(FETCH_PAGE, Step::Fetch))?;

    Ok(FetchPageOutput {
        document: page_to_document(&page, &input.credentials.base_url),
    })
}

/// Run a CQL search, normalize every hit's page, and store the batch.
///
/// The hit's own title, excerpt, and URL are ignored; no time filter is
/// applied.
pub async fn search_cql(
    ctx: &ActivityContext,
    store: &dyn DocumentStore,
    input: SearchCqlInput,
) -> Result<SearchCqlOutput, ActivityError> {
    debug!(cql = %input.cql, "searching");

    let client = input
        .credentials
        .client()
        .map_err(fail(SEARCH_BY_QUERY, Step::Fetch))?;
    let limit = activity_limit(input.limit);

    let result = ctx
        .run(client.search(&input.cql, limit))
        .await
        .map_err(fail(SEARCH_BY_QUERY, Step::Fetch))?;

    let docs: Vec<Document> = result
        .results
        .iter()
        .map(|item| page_to_document(&item.content, &input.credentials.base_url))
        .collect();

    let data_ref = store_batch(ctx, store, &docs)
        .await
        .map_err(fail(SEARCH_BY_QUERY, Step::Store))?;

    info!(
        cql = %input.cql,
        stored = docs.len(),
        data_ref = %data_ref,
        "stored search results"
    );

    Ok(SearchCqlOutput {
        count: docs.len(),
        data_ref,
    })
}

async fn store_batch(
    ctx: &ActivityContext,
    store: &dyn DocumentStore,
    docs: &[Document],
) -> Result<DataRef, ConnectorError> {
    ctx.run(async {
        store
            .store_documents(docs)
            .await
            .map_err(ConnectorError::Store)
    })
    .await
}

fn fail(operation: &'static str, step: Step) -> impl Fn(ConnectorError) -> ActivityError {
    move |source| ActivityError::new(operation, step, source)
}

fn activity_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(n) if n > 0 => n,
        _ => DEFAULT_ACTIVITY_LIMIT,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Cutoff parsing
// ═══════════════════════════════════════════════════════════════════════

/// Parse a cutoff given as RFC 3339 or as a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_since(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!(
        "invalid cutoff '{}': expected RFC 3339 (2024-03-01T10:00:00Z) or YYYY-MM-DD",
        s
    )
}

fn deserialize_since<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_since(s).map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_activity_limit_default() {
        assert_eq!(activity_limit(None), 100);
        assert_eq!(activity_limit(Some(0)), 100);
        assert_eq!(activity_limit(Some(-1)), 100);
        assert_eq!(activity_limit(Some(10)), 10);
    }

    #[test]
    fn test_parse_since_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_since("2024-03-01").unwrap(), expected);
        assert_eq!(parse_since("2024-03-01T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_since("2024-03-01T02:00:00+02:00").unwrap(), expected);
        assert!(parse_since("yesterday").is_err());
    }

    #[test]
    fn test_input_deserializes_from_flat_json() {
        let input: FetchPagesInput = serde_json::from_value(serde_json::json!({
            "base_url": "https://acme.atlassian.net",
            "email": "bot@acme.com",
            "api_token": "t",
            "space_key": "ENG",
            "since": "2024-03-01"
        }))
        .unwrap();
        assert_eq!(input.space_key, "ENG");
        assert_eq!(input.credentials.email, "bot@acme.com");
        assert_eq!(input.limit, None);
        assert_eq!(
            input.since,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let creds = Credentials {
            base_url: "https://acme.atlassian.net".to_string(),
            email: "bot@acme.com".to_string(),
            api_token: "hunter2".to_string(),
            timeout_secs: None,
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_default_context_runs_to_completion() {
        let ctx = ActivityContext::new();
        let out = ctx.run(async { Ok::<_, ConnectorError>(5) }).await.unwrap();
        assert_eq!(out, 5);
    }

    #[tokio::test]
    async fn test_cancelled_context_aborts() {
        let (ctx, handle) = ActivityContext::cancellable();
        handle.cancel();
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, ConnectorError>(())
            })
            .await;
        assert!(matches!(res, Err(ConnectorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_aborts() {
        let ctx = ActivityContext::new().with_timeout(Duration::from_millis(20));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, ConnectorError>(())
            })
            .await;
        assert!(matches!(res, Err(ConnectorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (ctx, handle) = ActivityContext::cancellable();
        drop(handle);
        let out = ctx.run(async { Ok::<_, ConnectorError>("done") }).await.unwrap();
        assert_eq!(out, "done");
    }
}
