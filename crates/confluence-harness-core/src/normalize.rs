//! Page-to-document normalization.
//!
//! Converts Confluence markup into plain text and builds the
//! [`Document`] record for a [`Page`]. Tag removal is a flat scan over
//! `<...>` spans: there is no nesting model and no recovery for
//! malformed markup.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{Document, Page, SOURCE};

/// Character entities decoded after tag removal, applied once each in
/// this order.
const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

/// Strip markup from `raw`, returning whitespace-normalized plain text.
///
/// 1. Every `<...>` span is replaced by a single space. An unterminated
///    `<` is kept as literal text.
/// 2. The entities in [`ENTITIES`] are decoded.
/// 3. Whitespace runs collapse to one space; the ends are trimmed.
///
/// # Example
///
/// ```rust
/// use confluence_harness_core::normalize::strip_markup;
///
/// assert_eq!(strip_markup("<p>Hello&nbsp;World</p>"), "Hello World");
/// ```
pub fn strip_markup(raw: &str) -> String {
    let mut text = remove_tags(raw);
    for (entity, literal) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, literal);
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn remove_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push(' ');
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// Build the normalized [`Document`] for a page.
///
/// Content comes from the storage representation, falling back to the
/// view representation when storage strips to nothing. Both empty yields
/// an empty body, not an error. The URL is `base_url` concatenated with
/// the page's web UI link as-is.
pub fn page_to_document(page: &Page, base_url: &str) -> Document {
    let mut content = strip_markup(&page.body.storage.value);
    if content.is_empty() {
        content = strip_markup(&page.body.view.value);
    }

    let metadata = BTreeMap::from([
        ("page_id".to_string(), page.id.clone()),
        ("space_key".to_string(), page.space.key.clone()),
        ("space_name".to_string(), page.space.name.clone()),
        ("status".to_string(), page.status.clone()),
        ("version".to_string(), page.version.number.to_string()),
    ]);

    Document {
        id: page.id.clone(),
        content,
        title: page.title.clone(),
        source: SOURCE.to_string(),
        url: format!("{}{}", base_url, page.links.web_ui),
        metadata,
        updated_at: page.version.created_at,
    }
}

/// Drop every page whose version was created strictly before `since`.
///
/// Pages created exactly at `since` are kept. `None` keeps everything.
pub fn retain_since(pages: Vec<Page>, since: Option<DateTime<Utc>>) -> Vec<Page> {
    match since {
        Some(cutoff) => pages
            .into_iter()
            .filter(|p| p.version.created_at >= cutoff)
            .collect(),
        None => pages,
    }
}
