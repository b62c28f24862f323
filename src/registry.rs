//! Named operation registry for host schedulers.
//!
//! Each orchestrated operation is exposed as an [`Activity`] under a
//! stable name so that a workflow host can discover it, read its JSON
//! parameter schema, and invoke it with JSON parameters.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               ActivityRegistry               │
//! │  ┌─────────────┐ ┌────────────┐ ┌──────────┐ │
//! │  │ fetch-pages │ │ fetch-page │ │ search-  │ │
//! │  │             │ │            │ │ by-query │ │
//! │  └─────────────┘ └────────────┘ └──────────┘ │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!            execute(params, ctx) → JSON
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use confluence_harness::registry::ActivityRegistry;
//! use confluence_harness_core::store::memory::InMemoryStore;
//!
//! let registry = ActivityRegistry::with_builtins(Arc::new(InMemoryStore::new()));
//! assert!(registry.find("fetch-pages").is_some());
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use confluence_harness_core::store::DocumentStore;

use crate::activities::{
    fetch_page, fetch_pages, search_cql, ActivityContext, FetchPageInput, FetchPagesInput,
    SearchCqlInput, FETCH_PAGE, FETCH_PAGES, SEARCH_BY_QUERY,
};

/// Provider name reported to host schedulers.
pub const PROVIDER_NAME: &str = "confluence-harness";

/// Provider version reported to host schedulers.
pub const PROVIDER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// An independently invocable operation.
#[async_trait]
pub trait Activity: Send + Sync {
    /// Stable registration name (e.g. `"fetch-pages"`).
    fn name(&self) -> &str;

    /// One-line description for discovery listings.
    fn description(&self) -> &str;

    /// JSON Schema of the accepted parameters object.
    fn parameters_schema(&self) -> Value;

    /// Run the operation with JSON parameters.
    ///
    /// Parameter errors and operation failures are both returned as
    /// errors; an operation failure downcasts to
    /// [`ActivityError`](crate::error::ActivityError).
    async fn execute(&self, params: Value, ctx: &ActivityContext) -> Result<Value>;
}

fn credential_properties() -> Value {
    json!({
        "base_url": { "type": "string", "description": "Site base URL, e.g. https://acme.atlassian.net" },
        "email": { "type": "string", "description": "Account email" },
        "api_token": { "type": "string", "description": "API token" },
        "timeout_secs": { "type": "integer", "description": "Request timeout in seconds", "default": 30 }
    })
}

fn schema(extra: Value, required: &[&str]) -> Value {
    let mut properties = credential_properties();
    if let (Some(base), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    let mut req = vec!["base_url", "email", "api_token"];
    req.extend_from_slice(required);
    json!({
        "type": "object",
        "properties": properties,
        "required": req
    })
}

/// `fetch-pages`: store every page of a space revised at or after a cutoff.
pub struct FetchPagesActivity {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl Activity for FetchPagesActivity {
    fn name(&self) -> &str {
        FETCH_PAGES
    }

    fn description(&self) -> &str {
        "Fetch the pages of a space and store them as a document batch"
    }

    fn parameters_schema(&self) -> Value {
        schema(
            json!({
                "space_key": { "type": "string", "description": "Space key, e.g. ENG" },
                "since": { "type": "string", "description": "Keep pages revised at or after this instant (RFC 3339 or YYYY-MM-DD)" },
                "limit": { "type": "integer", "description": "Max pages to fetch", "default": 100 }
            }),
            &["space_key"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ActivityContext) -> Result<Value> {
        let input: FetchPagesInput = serde_json::from_value(params)?;
        let output = fetch_pages(ctx, self.store.as_ref(), input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// `fetch-page`: return one page as a document, without storing it.
pub struct FetchPageActivity;

#[async_trait]
impl Activity for FetchPageActivity {
    fn name(&self) -> &str {
        FETCH_PAGE
    }

    fn description(&self) -> &str {
        "Fetch a single page by id and return it as a document"
    }

    fn parameters_schema(&self) -> Value {
        schema(
            json!({
                "page_id": { "type": "string", "description": "Page id" }
            }),
            &["page_id"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ActivityContext) -> Result<Value> {
        let input: FetchPageInput = serde_json::from_value(params)?;
        let output = fetch_page(ctx, input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// `search-by-query`: store the pages matched by a CQL query.
pub struct SearchByQueryActivity {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl Activity for SearchByQueryActivity {
    fn name(&self) -> &str {
        SEARCH_BY_QUERY
    }

    fn description(&self) -> &str {
        "Search with CQL and store the matched pages as a document batch"
    }

    fn parameters_schema(&self) -> Value {
        schema(
            json!({
                "cql": { "type": "string", "description": "CQL query, e.g. type=page AND text~\"deploy\"" },
                "limit": { "type": "integer", "description": "Max results", "default": 100 }
            }),
            &["cql"],
        )
    }

    async fn execute(&self, params: Value, ctx: &ActivityContext) -> Result<Value> {
        let input: SearchCqlInput = serde_json::from_value(params)?;
        let output = search_cql(ctx, self.store.as_ref(), input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Registry of named activities.
pub struct ActivityRegistry {
    activities: Vec<Box<dyn Activity>>,
}

impl ActivityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            activities: Vec::new(),
        }
    }

    /// Create a registry with the three Confluence operations, storing
    /// batches in `store`.
    pub fn with_builtins(store: Arc<dyn DocumentStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FetchPagesActivity {
            store: store.clone(),
        }));
        registry.register(Box::new(FetchPageActivity));
        registry.register(Box::new(SearchByQueryActivity { store }));
        registry
    }

    /// Register an activity. [`find`](Self::find) returns the first
    /// activity registered under a given name.
    pub fn register(&mut self, activity: Box<dyn Activity>) {
        self.activities.push(activity);
    }

    pub fn activities(&self) -> &[Box<dyn Activity>] {
        &self.activities
    }

    pub fn find(&self, name: &str) -> Option<&dyn Activity> {
        self.activities
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    /// Look up `name` and execute it.
    pub async fn execute(&self, name: &str, params: Value, ctx: &ActivityContext) -> Result<Value> {
        match self.find(name) {
            Some(activity) => activity.execute(params, ctx).await,
            None => anyhow::bail!(
                "Unknown activity: '{}'. Available: {}",
                name,
                self.activities
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_harness_core::store::memory::InMemoryStore;

    fn registry() -> ActivityRegistry {
        ActivityRegistry::with_builtins(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn test_builtin_names_are_stable() {
        let reg = registry();
        let names: Vec<&str> = reg.activities().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["fetch-pages", "fetch-page", "search-by-query"]);
        assert_eq!(reg.len(), 3);
        assert!(!reg.is_empty());
    }

    #[test]
    fn test_schemas_require_credentials() {
        let reg = registry();
        for activity in reg.activities() {
            let schema = activity.parameters_schema();
            assert_eq!(schema["type"], "object");
            let required: Vec<&str> = schema["required"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|v| v.as_str())
                .collect();
            for key in ["base_url", "email", "api_token"] {
                assert!(required.contains(&key), "{} missing {}", activity.name(), key);
                assert!(schema["properties"][key].is_object());
            }
        }
        let fetch_pages = reg.find("fetch-pages").unwrap().parameters_schema();
        assert!(fetch_pages["properties"]["since"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_activity() {
        let reg = registry();
        let err = reg
            .execute("confluence.SearchCQL", json!({}), &ActivityContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown activity"));
        assert!(err.to_string().contains("search-by-query"));
    }

    #[tokio::test]
    async fn test_missing_parameters_rejected() {
        let reg = registry();
        let err = reg
            .execute(
                "fetch-page",
                json!({ "base_url": "http://127.0.0.1:1", "email": "a", "api_token": "b" }),
                &ActivityContext::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("page_id"));
    }
}
