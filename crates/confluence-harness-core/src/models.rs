//! Data models for Confluence pages and the normalized documents built
//! from them.
//!
//! The remote types mirror the Confluence REST API (v1 content endpoints)
//! and decode leniently: a field the server omits takes its zero value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag stamped on every [`Document`] produced by this crate.
pub const SOURCE: &str = "confluence";

/// A Confluence page at its current revision.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Page {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub status: String,
    pub title: String,
    pub space: Space,
    pub body: Body,
    pub version: Version,
    #[serde(rename = "_links")]
    pub links: PageLinks,
}

/// The space a page lives in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Space {
    pub id: i64,
    pub key: String,
    pub name: String,
}

/// Page body in its two markup representations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Body {
    /// Storage format (XHTML-based source markup).
    pub storage: BodyValue,
    /// View format (rendered HTML).
    pub view: BodyValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BodyValue {
    pub value: String,
}

/// Revision descriptor for the page's current version.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Version {
    pub number: i64,
    /// Human-readable timestamp as reported by the server. Informational only.
    pub when: String,
    /// Precise creation instant of this revision. Decodes as the Unix epoch
    /// when absent.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageLinks {
    /// Web UI path relative to the site base, e.g. `/spaces/ENG/pages/123`.
    #[serde(rename = "webui")]
    pub web_ui: String,
    #[serde(rename = "self")]
    pub self_link: String,
}

/// Response envelope of a CQL search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub results: Vec<SearchResultItem>,
    pub start: i64,
    pub limit: i64,
    pub size: i64,
}

/// One hit of a CQL search, wrapping the matched page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchResultItem {
    pub content: Page,
    pub title: String,
    pub excerpt: String,
    pub url: String,
    #[serde(rename = "resultGlobalContainer")]
    pub result_type: serde_json::Value,
}

/// Response envelope of a content listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageList {
    pub results: Vec<Page>,
}

/// Normalized, plain-text document handed to a [`DocumentStore`](crate::store::DocumentStore).
///
/// `id` always equals the source page id, and `metadata` always holds
/// exactly the keys `page_id`, `space_key`, `space_name`, `status`,
/// and `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub url: String,
    pub metadata: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}
