//! The `wasm-prune` executable entry point.

use anyhow::Result;
use clap::Parser;
use wasm_prune::PruneCommand;

fn main() -> Result<()> {
    env_logger::init();
    PruneCommand::parse().execute()
}
