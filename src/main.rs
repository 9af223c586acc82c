use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod chat;
mod cli;
mod commands;
mod config;
mod ingest;
mod lm;
mod model;
mod prompts;
mod render;
mod report;
mod schema;
mod templates;
mod workflow;
mod workspace;

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_tracing(args.global.verbose);
    commands::run(args)
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
