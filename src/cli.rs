//! Command-line interface.

use crate::config::{Config, expand_tilde};
use crate::doxygen;
use crate::index::{Codec, EncodedIndex, build_index, write_index};
use crate::search::QueryEngine;
use crate::server::{self, SymdexServer};
use crate::store::{DirSource, ShardStore};
use crate::types::SymbolRecord;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "symdex")]
#[command(about = "Build and query sharded symbol search indexes for generated API docs", long_about = None)]
pub struct Cli {
    /// Config file (default: ./symdex.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build an index from a JSON array of symbol records
    Build {
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[command(flatten)]
        options: BuildOptions,
    },
    /// Build an index from Doxygen `search/*.js` files
    Import {
        /// A searchData file or a directory of them
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[command(flatten)]
        options: BuildOptions,
    },
    /// Run one query against a built index
    Query {
        text: String,
        #[arg(short, long)]
        index: PathBuf,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print the result set as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve a built index over MCP (stdio)
    Serve {
        #[arg(short, long)]
        index: PathBuf,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct BuildOptions {
    /// Maximum entries per shard
    #[arg(short = 's', long)]
    pub shard_size: Option<usize>,
    /// Shard encoding: json or postcard
    #[arg(long)]
    pub codec: Option<Codec>,
}

impl BuildOptions {
    /// Resolves flags over config values.
    fn resolve(&self, config: &Config) -> (usize, Codec) {
        (
            self.shard_size.unwrap_or(config.build.target_shard_size),
            self.codec.unwrap_or(config.build.codec),
        )
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::discover(cli.config.as_deref())
        .await
        .context("Failed to load config")?;

    match cli.command {
        Commands::Build {
            input,
            out,
            options,
        } => {
            let records = read_records(&input).await?;
            build_and_write(records, &out, &options, &config).await
        }
        Commands::Import {
            input,
            out,
            options,
        } => {
            let records = doxygen::import_path(&input)
                .await
                .context("Failed to import Doxygen search data")?;
            build_and_write(records, &out, &options, &config).await
        }
        Commands::Query {
            text,
            index,
            limit,
            json,
        } => {
            let engine = open_engine(&index, limit, &config).await?;
            let result = engine.search(&text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", result.render());
            }
            Ok(())
        }
        Commands::Serve { index, limit } => {
            let engine = open_engine(&index, limit, &config).await?;
            server::serve(SymdexServer::new(engine)).await
        }
    }
}

async fn read_records(path: &Path) -> Result<Vec<SymbolRecord>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not a JSON array of symbol records", path.display()))
}

async fn build_and_write(
    records: Vec<SymbolRecord>,
    out: &Path,
    options: &BuildOptions,
    config: &Config,
) -> Result<()> {
    let (shard_size, codec) = options.resolve(config);
    let out = PathBuf::from(expand_tilde(&out.to_string_lossy()).as_ref());

    // Partitioning sorts the whole table; keep it off the async workers
    let index: EncodedIndex =
        tokio::task::spawn_blocking(move || build_index(records, shard_size, codec))
            .await
            .context("Build task panicked")??;
    write_index(&out, &index).await?;

    println!(
        "Wrote {} shards ({} entries, {} bytes) to {}",
        index.files.len(),
        index.manifest.entry_count(),
        index.total_bytes(),
        out.display()
    );
    Ok(())
}

async fn open_engine(index: &Path, limit: Option<usize>, config: &Config) -> Result<QueryEngine> {
    let root = PathBuf::from(expand_tilde(&index.to_string_lossy()).as_ref());
    let store = ShardStore::open(Arc::new(DirSource::new(&root)))
        .await
        .with_context(|| format!("Failed to open index at {}", root.display()))?;

    let mut engine = QueryEngine::new(store).with_limit(limit.unwrap_or(config.query.result_limit));
    if let Some(deadline) = config.query.fetch_timeout() {
        engine = engine.with_fetch_deadline(deadline);
    }
    Ok(engine)
}
