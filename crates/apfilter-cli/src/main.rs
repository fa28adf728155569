//! apfilter CLI: evaluate, render and index ActivityStreams filters.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use apfilter_core::{build_pattern, filter_item, matches_raw, sql_limit, sql_where, Checks};
use apfilter_index::{
    confirm_candidates, filters_from_checks, Field, Index, IndexConfig, IndexError,
};
use apfilter_vocab::Item;

#[derive(Parser)]
#[command(name = "apfilter")]
#[command(author, version, about = "Query-string filters over ActivityStreams items")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a query against an item, array or collection
    Filter {
        /// Filter query string, e.g. `type=Note&actor.name=~bob`
        #[arg(short, long)]
        query: String,
        /// JSON input (`-` for stdin)
        input: PathBuf,
    },

    /// Print the WHERE clauses, positional values and limit for a query
    Sql {
        #[arg(short, long)]
        query: String,
    },

    /// Print the event pattern for a query, or test a raw record against it
    Pattern {
        #[arg(short, long)]
        query: String,
        /// Raw JSON record to match (`-` for stdin)
        record: Option<PathBuf>,
    },

    /// Index items and resolve a query through the bitmap index
    Index {
        #[arg(short, long)]
        query: String,
        /// JSON array or collection of items (`-` for stdin)
        input: PathBuf,
        /// Persist the index snapshot here
        #[arg(long)]
        save: Option<PathBuf>,
        /// Print index candidates without re-checking them against the query
        #[arg(long)]
        candidates: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON file holding an index configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reference hash seed
    #[arg(long)]
    seed: Option<u32>,
    /// Registered fields, comma separated (e.g. `type,name,actor`)
    #[arg(long, value_delimiter = ',')]
    fields: Vec<Field>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<IndexConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => IndexConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if !self.fields.is_empty() {
            config.fields = self.fields.clone();
        }
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Filter { query, input } => cmd_filter(&query, &input),
        Commands::Sql { query } => cmd_sql(&query),
        Commands::Pattern { query, record } => cmd_pattern(&query, record.as_deref()),
        Commands::Index {
            query,
            input,
            save,
            candidates,
            config,
        } => cmd_index(&query, &input, save.as_deref(), candidates, &config.resolve()?),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_filter(query: &str, input: &Path) -> Result<()> {
    let checks = Checks::from_query(query);
    debug!(checks = checks.len(), "parsed query");
    let item = read_item(input)?;
    let out = match filter_item(&checks, item) {
        Some(item) => item.to_json(),
        None => Value::Null,
    };
    print_json(&out)
}

fn cmd_sql(query: &str) -> Result<()> {
    let checks = Checks::from_query(query);
    let clause = sql_where(&checks);
    print_json(&json!({
        "where": clause.join(" AND "),
        "clauses": clause.clauses,
        "values": clause.values,
        "limit": sql_limit(&checks),
    }))
}

fn cmd_pattern(query: &str, record: Option<&Path>) -> Result<()> {
    let checks = Checks::from_query(query);
    match record {
        None => print_json(&build_pattern(&checks)),
        Some(path) => {
            let raw = read_input(path)?;
            print_json(&json!({ "matches": matches_raw(&checks, &raw) }))
        }
    }
}

fn cmd_index(
    query: &str,
    input: &Path,
    save: Option<&Path>,
    candidates_only: bool,
    config: &IndexConfig,
) -> Result<()> {
    let checks = Checks::from_query(query);
    let item = read_item(input)?;
    let items: Vec<Item> = match item.members() {
        Some(members) => members.to_vec(),
        None => vec![item],
    };

    let index = Index::new(config.clone());
    let mut skipped = 0usize;
    for it in &items {
        match index.add(it) {
            Ok(()) => {}
            Err(IndexError::Extraction(errors)) => {
                debug!(failed = errors.len(), "item partially indexed");
            }
            Err(err) => {
                warn!(%err, "item not indexed");
                skipped += 1;
            }
        }
    }
    debug!(indexed = index.len(), skipped, "built index");

    let filters = filters_from_checks(&checks);
    debug!(?filters, "bridged filters");
    let found = index.find(&filters)?;

    let links: Vec<String> = if candidates_only {
        found.into_iter().map(|l| l.into_string()).collect()
    } else {
        confirm_candidates(&checks, &found, &items)
            .iter()
            .filter_map(|it| it.id().map(|id| id.canonical()))
            .collect()
    };

    if let Some(path) = save {
        index
            .save(path)
            .with_context(|| format!("saving index to {}", path.display()))?;
    }
    print_json(&json!(links))
}

// ============================================================================
// I/O helpers
// ============================================================================

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn read_item(path: &Path) -> Result<Item> {
    let raw = read_input(path)?;
    let value: Value = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing JSON from {}", path.display()))?;
    Item::from_json(&value).ok_or_else(|| anyhow!("{} does not hold an item", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
