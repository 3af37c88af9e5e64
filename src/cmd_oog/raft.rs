use clap::*;
use oog::libs::oo::pipeline::{raft_stage, rafted_frags};
use oog::libs::oo::{loader, report, LogDiagnostics};
use std::io::Write;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("raft")
        .about("Merges overlapping fragments into rafts")
        .after_help(
            r###"
Reads info.mm, geno.lst, mmEnds and self.psl from <dir>, builds the rafts of
every barge and writes them in the same layout as the `raft` file of
`oog assemble`. Linking evidence is not used.

Examples:
1. Rafts to screen:
   oog raft ctg7/

2. With the decision log:
   oog raft ctg7/ -o rafts.txt --log raft.log

"###,
        )
        .arg(
            Arg::new("dir")
                .required(true)
                .index(1)
                .help("Contig directory"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .num_args(1)
                .help("Write every decision to this file"),
        )
        .arg(super::config_arg())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let cfg = super::load_config(args)?;
    let dir = Path::new(args.get_one::<String>("dir").unwrap());

    let mut input = loader::load_dir(dir, &cfg)?;
    let mut diag = match args.get_one::<String>("log") {
        Some(file) => LogDiagnostics::with_writer(oog::writer(file)?),
        None => LogDiagnostics::new(),
    };
    let mut rafts = raft_stage(&mut input.contig, &input.self_psls, &cfg, &mut diag)?;
    for r in rafts.live() {
        rafts.rafts[r].normalize(&input.contig);
    }

    let mut writer = oog::writer(args.get_one::<String>("outfile").unwrap())?;
    report::write_rafts(&mut writer, &input.contig, &rafts)?;
    writer.flush()?;
    let tally = diag.finish()?;

    eprintln!(
        "{} rafts, {} of {} frags rafted, {} merges, {} rejected",
        rafts.live().len(),
        rafted_frags(&rafts),
        input.contig.frags.len(),
        tally.merged,
        tally.rejected_total()
    );

    Ok(())
}
