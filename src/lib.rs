//! # Confluence Harness
//!
//! A stateless Confluence connector. Each operation fetches pages from the
//! Confluence REST API, normalizes their markup into plain-text documents,
//! and hands the batch to a pluggable document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Activities │──▶│    Client    │──▶│  Confluence  │
//! │ (registry) │   │  (reqwest)   │   │   REST API   │
//! └─────┬──────┘   └──────────────┘   └──────────────┘
//!       │
//!       ├──▶ normalize (strip markup → Document)
//!       │
//!       ▼
//! ┌──────────────┐
//! │ DocumentStore│  SQLite / in-memory → DataRef
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cfh init                                  # create database
//! cfh fetch-pages ENG --since 2024-03-01    # store a space's recent pages
//! cfh fetch-page 123456                     # print one page as a document
//! cfh search 'type=page AND text~"deploy"'  # store search hits
//! cfh batch sqlite:<uuid>                   # print a stored batch
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`activities`] | Orchestrated operations and cancellation |
//! | [`client`] | Confluence REST client |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`registry`] | Named operations for host schedulers |
//! | [`sqlite_store`] | SQLite batch store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |

pub mod activities;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod registry;
pub mod sqlite_store;
