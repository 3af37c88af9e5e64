//! Subcommand modules for the `oog` binary.

pub mod assemble;
pub mod raft;
pub mod range;

use anyhow::Context;
use clap::*;
use oog::libs::oo::AssemblyConfig;
use std::io::Read;

/// `--config` shared by the commands that run the assembler.
pub fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .num_args(1)
        .help("JSON file overriding the default parameters")
}

/// Defaults, then the `--config` file.
pub fn load_config(args: &ArgMatches) -> anyhow::Result<AssemblyConfig> {
    let cfg = match args.get_one::<String>("config") {
        Some(file) => {
            let mut text = String::new();
            oog::reader(file)?.read_to_string(&mut text)?;
            AssemblyConfig::from_json(&text).with_context(|| format!("bad config {}", file))?
        }
        None => AssemblyConfig::default(),
    };
    Ok(cfg)
}
