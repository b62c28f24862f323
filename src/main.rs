//! # Confluence Harness CLI (`cfh`)
//!
//! Runs the Confluence operations from the command line against the site
//! and SQLite store named in the config file.
//!
//! ## Usage
//!
//! ```bash
//! cfh --config ./config/cfh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cfh init` | Create the SQLite database and schema |
//! | `cfh fetch-pages <space>` | Store the pages of a space |
//! | `cfh fetch-page <id>` | Print one page as a JSON document |
//! | `cfh search <cql>` | Store the pages matched by a CQL query |
//! | `cfh batch <ref>` | Print a stored batch as JSON |
//! | `cfh activities` | List registered operations |
//! | `cfh run <name> --param k=v` | Invoke a registered operation |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use confluence_harness::activities::{
    self, parse_since, ActivityContext, FetchPageInput, FetchPagesInput, SearchCqlInput,
};
use confluence_harness::config::{self, Config};
use confluence_harness::logging;
use confluence_harness::registry::{ActivityRegistry, PROVIDER_NAME, PROVIDER_VERSION};
use confluence_harness::sqlite_store::SqliteStore;
use confluence_harness_core::store::{DataRef, DocumentStore};

/// Confluence Harness CLI — fetch Confluence pages, normalize them into
/// plain-text documents, and store them in batches.
#[derive(Parser)]
#[command(name = "cfh", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cfh.toml")]
    config: PathBuf,

    /// Abort the operation if it has not finished after this many seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Fetch the pages of a space and store them as one batch.
    FetchPages {
        /// Space key (e.g. `ENG`).
        space_key: String,

        /// Only keep pages revised at or after this instant (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of pages to fetch.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Fetch one page and print it as a JSON document. Nothing is stored.
    FetchPage {
        /// Page id.
        page_id: String,
    },

    /// Search with CQL and store the matched pages as one batch.
    Search {
        /// CQL query (e.g. `type=page AND text~"deploy"`).
        cql: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print a stored batch as JSON.
    Batch {
        /// Batch reference as printed by `fetch-pages` or `search` (e.g. `sqlite:<uuid>`).
        data_ref: String,
    },

    /// List registered operations and their parameter schemas.
    Activities,

    /// Invoke a registered operation by name.
    ///
    /// Credentials come from the config file; `--param` values override them.
    Run {
        /// Operation name (`fetch-pages`, `fetch-page`, `search-by-query`).
        name: String,

        /// Parameters as `key=value` pairs.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Build the invocation context: Ctrl-C cancels, `--timeout-secs` sets a deadline.
fn activity_context(timeout_secs: Option<u64>) -> ActivityContext {
    let (mut ctx, handle) = ActivityContext::cancellable();
    if let Some(secs) = timeout_secs {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            handle.cancel();
        }
    });
    ctx
}

async fn open_store(cfg: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&cfg.db.path)
        .await
        .with_context(|| format!("Failed to open database: {}", cfg.db.path.display()))?;
    Ok(Arc::new(store))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level);

    let ctx = activity_context(cli.timeout_secs);

    match cli.command {
        Commands::Init => {
            open_store(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::FetchPages {
            space_key,
            since,
            limit,
        } => {
            let since = since.as_deref().map(parse_since).transpose()?;
            let store = open_store(&cfg).await?;
            let output = activities::fetch_pages(
                &ctx,
                store.as_ref(),
                FetchPagesInput {
                    credentials: cfg.credentials(),
                    space_key,
                    since,
                    limit,
                },
            )
            .await?;
            println!("stored {} documents", output.count);
            println!("ref: {}", output.data_ref);
        }
        Commands::FetchPage { page_id } => {
            let output = activities::fetch_page(
                &ctx,
                FetchPageInput {
                    credentials: cfg.credentials(),
                    page_id,
                },
            )
            .await?;
            print_json(&output.document)?;
        }
        Commands::Search { cql, limit } => {
            let store = open_store(&cfg).await?;
            let output = activities::search_cql(
                &ctx,
                store.as_ref(),
                SearchCqlInput {
                    credentials: cfg.credentials(),
                    cql,
                    limit,
                },
            )
            .await?;
            println!("stored {} documents", output.count);
            println!("ref: {}", output.data_ref);
        }
        Commands::Batch { data_ref } => {
            let data_ref: DataRef = data_ref.parse()?;
            let store = open_store(&cfg).await?;
            match store.load_documents(&data_ref).await? {
                Some(docs) => print_json(&docs)?,
                None => bail!("No batch found for reference: {}", data_ref),
            }
        }
        Commands::Activities => {
            let store = open_store(&cfg).await?;
            let registry = ActivityRegistry::with_builtins(store);
            println!("{} {}", PROVIDER_NAME, PROVIDER_VERSION);
            for activity in registry.activities() {
                println!();
                println!("{}  {}", activity.name(), activity.description());
                println!(
                    "{}",
                    serde_json::to_string_pretty(&activity.parameters_schema())?
                );
            }
        }
        Commands::Run { name, params } => {
            let store = open_store(&cfg).await?;
            let registry = ActivityRegistry::with_builtins(store);

            let mut object = serde_json::to_value(cfg.credentials())?;
            for (key, value) in params {
                object[key.as_str()] = param_value(&key, &value);
            }
            let result = registry.execute(&name, object, &ctx).await?;
            print_json(&json!({ "result": result }))?;
        }
    }

    Ok(())
}

/// Parameters that operations take as integers.
const NUMERIC_PARAMS: [&str; 2] = ["limit", "timeout_secs"];

fn param_value(key: &str, raw: &str) -> Value {
    if NUMERIC_PARAMS.contains(&key) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::from(n);
        }
    }
    Value::String(raw.to_string())
}
