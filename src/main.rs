//! Type Graph Mapper - command-line front end.
//!
//! Scans a directory of annotated Rust model files, resolves a mapper for
//! every concrete type and prints a mapping report.
//!
//! # Usage
//!
//! ```bash
//! typegraph-mapper [OPTIONS] <MODEL_PATH>
//! ```
//!
//! Report with C# and Java client names as JSON:
//! ```bash
//! typegraph-mapper ./model -f json -t csharp -t java -o mapping.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use typegraph_mapper::cli;

fn main() -> Result<()> {
    // parse once up front so the verbose flag can set the log level
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Type Graph Mapper starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    cli::run(args)?;

    info!("Mapping report generation completed successfully");

    Ok(())
}
