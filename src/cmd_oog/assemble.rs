use clap::*;
use oog::libs::oo::{loader, Assembly, LogDiagnostics};
use std::io::Write;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("assemble")
        .about("Orders and orients the fragments of a contig into a golden path")
        .after_help(
            r###"
<dir> holds one contig:

* info.mm     - `<contig> PLACED`, then `acc mapPosKb phase flipTendency`
* geno.lst    - FASTA files, one clone each, named after the accession
* mmEnds      - one barge per line: `+(acc`, `-(acc`, `?(acc` and `acc)`
* cloneOverlap, self.psl, mrna.psl, est.psl, readPairs + pairedReads.psl,
  bacEndPairs + bacEnd.psl, fragChains - optional

Any of them may be gzipped (.gz).

Written to <outdir>: gold, <contig>.fa, gl, ooGreedy.gl, raft, barge, graph,
graph.json, raft.psl, fragMap, raftOrder and the decision log oog.log.

Examples:
1. Assemble in place:
   oog assemble ctg7/

2. Somewhere else, with a larger fragment gap:
   oog assemble ctg7/ -o out/ --frag-gap 200

3. Save the defaults as a starting point for --config:
   oog assemble --dump-config > params.json

"###,
        )
        .arg(
            Arg::new("dir")
                .required_unless_present("dump_config")
                .index(1)
                .help("Contig directory"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .help("Output directory. Defaults to <dir>"),
        )
        .arg(super::config_arg())
        .arg(
            Arg::new("dump_config")
                .long("dump-config")
                .action(ArgAction::SetTrue)
                .help("Print the effective parameters as JSON and exit"),
        )
        .arg(
            Arg::new("max_tail_size")
                .long("max-tail-size")
                .num_args(1)
                .value_parser(value_parser!(i32))
                .help("Unaligned bases tolerated at the ends of an overlap"),
        )
        .arg(
            Arg::new("min_score")
                .long("min-score")
                .num_args(1)
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i32))
                .help("Drop overlaps scoring below this"),
        )
        .arg(
            Arg::new("frag_gap")
                .long("frag-gap")
                .num_args(1)
                .value_parser(value_parser!(i32))
                .help("Size of gaps between rafts of one barge"),
        )
        .arg(
            Arg::new("min_frag_size")
                .long("min-frag-size")
                .num_args(1)
                .value_parser(value_parser!(i32))
                .help("Smaller fragments take no part in overlaps"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut cfg = super::load_config(args)?;
    if let Some(&v) = args.get_one::<i32>("max_tail_size") {
        cfg.max_tail_size = v;
    }
    if let Some(&v) = args.get_one::<i32>("min_score") {
        cfg.min_score = v;
    }
    if let Some(&v) = args.get_one::<i32>("frag_gap") {
        cfg.frag_gap = v;
    }
    if let Some(&v) = args.get_one::<i32>("min_frag_size") {
        cfg.min_frag_size = v;
    }
    cfg.validate()?;

    if args.get_flag("dump_config") {
        let mut writer = oog::writer("stdout")?;
        serde_json::to_writer_pretty(&mut writer, &cfg)?;
        writer.write_fmt(format_args!("\n"))?;
        writer.flush()?;
        return Ok(());
    }

    let dir = Path::new(args.get_one::<String>("dir").unwrap());
    let outdir = match args.get_one::<String>("outdir") {
        Some(o) => Path::new(o).to_path_buf(),
        None => dir.to_path_buf(),
    };
    std::fs::create_dir_all(&outdir)?;

    let input = loader::load_dir(dir, &cfg)?;
    let log_file = outdir.join("oog.log");
    let mut diag = LogDiagnostics::with_writer(oog::writer(&log_file.to_string_lossy())?);
    let assembly = Assembly::run(input, &cfg, &mut diag)?;
    assembly.write_outputs(&outdir)?;
    let tally = diag.finish()?;

    eprintln!("{}", assembly.stats);
    eprintln!(
        "decisions\t{} accepted, {} merged, {} degraded, {} rejected",
        tally.accepted,
        tally.merged,
        tally.degraded,
        tally.rejected_total()
    );
    for (kind, n) in &tally.rejected {
        eprintln!("\t{}\t{}", kind, n);
    }

    Ok(())
}
