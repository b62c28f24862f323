//! # Confluence Harness Core
//!
//! Shared, I/O-free logic for Confluence Harness: the remote page models,
//! markup normalization into [`Document`](models::Document)s, and the
//! [`DocumentStore`](store::DocumentStore) abstraction that batches are
//! persisted through.
//!
//! This crate contains no tokio, reqwest, sqlx, or filesystem access.

pub mod models;
pub mod normalize;
pub mod store;
