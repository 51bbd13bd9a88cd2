use clap::Parser;
use symdex::cli::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for MCP frames and query output
    symdex::tracing::init();

    run(Cli::parse()).await
}
