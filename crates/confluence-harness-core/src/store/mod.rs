//! Batch storage abstraction for normalized documents.
//!
//! The [`DocumentStore`] trait is the single seam between the fetch
//! operations and wherever documents end up. A store accepts an ordered
//! batch and hands back an opaque [`DataRef`] that downstream consumers
//! use to load the batch again.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Document;

/// Opaque reference to a stored batch.
///
/// Rendered as `<backend>:<key>` and parseable back from that form. The
/// `count` is informational and not part of the textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRef {
    pub backend: String,
    pub key: String,
    #[serde(default)]
    pub count: usize,
}

impl DataRef {
    pub fn new(backend: impl Into<String>, key: impl Into<String>, count: usize) -> Self {
        Self {
            backend: backend.into(),
            key: key.into(),
            count,
        }
    }
}

impl fmt::Display for DataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.key)
    }
}

impl FromStr for DataRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((backend, key)) if !backend.is_empty() && !key.is_empty() => {
                Ok(DataRef::new(backend, key, 0))
            }
            _ => bail!("invalid batch reference '{}': expected <backend>:<key>", s),
        }
    }
}

/// Persistence backend for document batches.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`store_documents`](DocumentStore::store_documents) | Persist one ordered batch, all or nothing |
/// | [`load_documents`](DocumentStore::load_documents) | Load a batch by reference |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist `docs` as one batch and return its reference.
    ///
    /// An empty batch is valid and yields a reference with `count == 0`.
    /// On error nothing from the batch may remain stored.
    async fn store_documents(&self, docs: &[Document]) -> Result<DataRef>;

    /// Load a previously stored batch, in its original order.
    ///
    /// Returns `Ok(None)` if the reference is unknown to this store.
    async fn load_documents(&self, data_ref: &DataRef) -> Result<Option<Vec<Document>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_ref_round_trips_through_display() {
        let r = DataRef::new("sqlite", "0f8e", 3);
        let parsed: DataRef = r.to_string().parse().unwrap();
        assert_eq!(parsed.backend, "sqlite");
        assert_eq!(parsed.key, "0f8e");
    }

    #[test]
    fn test_data_ref_rejects_malformed() {
        assert!("nocolon".parse::<DataRef>().is_err());
        assert!(":key".parse::<DataRef>().is_err());
        assert!("memory:".parse::<DataRef>().is_err());
    }
}
