extern crate clap;
use clap::*;

mod cmd_oog;

fn main() -> anyhow::Result<()> {
    let app = Command::new("oog")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`oog` - Greedy ordering and orienting of draft contigs")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log stage summaries. RUST_LOG takes precedence"),
        )
        .subcommand(cmd_oog::assemble::make_subcommand())
        .subcommand(cmd_oog::raft::make_subcommand())
        .subcommand(cmd_oog::range::make_subcommand())
        .after_help(
            r###"Subcommands:

* assemble - Order and orient the fragments of one contig into a golden path
* raft     - Only merge overlapping fragments into rafts
* range    - Check a system of distance constraints

"###,
        );

    let matches = app.get_matches();

    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if matches.get_flag("verbose") {
            "info".to_string()
        } else {
            "warn".to_string()
        }
    });
    pretty_env_logger::formatted_builder()
        .parse_filters(&level)
        .init();

    // Check which subcomamnd the user ran...
    match matches.subcommand() {
        Some(("assemble", sub_matches)) => cmd_oog::assemble::execute(sub_matches),
        Some(("raft", sub_matches)) => cmd_oog::raft::execute(sub_matches),
        Some(("range", sub_matches)) => cmd_oog::range::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
