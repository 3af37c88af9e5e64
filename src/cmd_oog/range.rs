use clap::*;
use indexmap::IndexSet;
use oog::libs::oo::range::{added_range_consistent, is_consistent, RangeEdge};
use oog::libs::oo::AssemblyError;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("range")
        .about("Checks that distance constraints between named points can all hold")
        .after_help(
            r###"
Each line of <infile> is `a b min max`: point b lies between min and max bases
after point a. Prints `consistent` or `inconsistent`.

With --add, the answer covers the file plus one extra constraint.

Examples:
1. oog range constraints.tsv

2. oog range constraints.tsv --add "x y 100 200"

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Constraints, one per line. [stdin] for screen"),
        )
        .arg(
            Arg::new("add")
                .long("add")
                .num_args(1)
                .allow_hyphen_values(true)
                .help("One more constraint, \"a b min max\""),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

fn parse_edge(
    names: &mut IndexSet<String>,
    file: &str,
    line_no: usize,
    line: &str,
) -> anyhow::Result<RangeEdge> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() != 4 {
        return Err(AssemblyError::parse(file, line_no, "expecting `a b min max`").into());
    }
    let num = |w: &str| {
        w.parse::<i64>()
            .map_err(|_| AssemblyError::parse(file, line_no, format!("expecting a number, got {}", w)))
    };
    let (min, max) = (num(words[2])?, num(words[3])?);
    let (from, _) = names.insert_full(words[0].to_string());
    let (to, _) = names.insert_full(words[1].to_string());

    Ok(RangeEdge::new(from, to, min, max))
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let infile = args.get_one::<String>("infile").unwrap();
    let mut writer = oog::writer(args.get_one::<String>("outfile").unwrap())?;

    let mut names: IndexSet<String> = IndexSet::new();
    let mut edges = vec![];
    for (line_no, line) in oog::data_lines(infile)? {
        edges.push(parse_edge(&mut names, infile, line_no, &line)?);
    }

    let ok = match args.get_one::<String>("add") {
        Some(add) => {
            let candidate = parse_edge(&mut names, "--add", 1, add)?;
            added_range_consistent(names.len(), &edges, candidate)
        }
        None => is_consistent(names.len(), &edges),
    };
    log::info!("{} constraints between {} points", edges.len(), names.len());

    writer.write_fmt(format_args!(
        "{}\n",
        if ok { "consistent" } else { "inconsistent" }
    ))?;
    writer.flush()?;

    Ok(())
}
