//! Reads an assembly directory: clones and their fragments, barges, self alignments
//! and every kind of linking evidence.

use crate::libs::oo::config::AssemblyConfig;
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::evidence::{attach_pair_psls, group_transcripts, Evidence, Pair};
use crate::libs::oo::graph::CableKind;
use crate::libs::oo::model::{CloneEnd, Contig, Phase};
use crate::libs::oo::pipeline::AssemblyInput;
use crate::libs::psl::Psl;
use anyhow::Context;
use fxhash::FxHashSet;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::BufRead;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref START_RE: Regex = Regex::new(r"^([-+?])\((\S+)$").unwrap();
    static ref END_RE: Regex = Regex::new(r"^(\S+)\)$").unwrap();
}

/// Accessions of clones left out of the assembly.
pub type Excluded = FxHashSet<String>;

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// `dir/name`, or `dir/name.gz` when only the compressed file is there.
pub fn locate(dir: &Path, name: &str) -> Option<PathBuf> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Some(plain);
    }
    let gz = dir.join(format!("{}.gz", name));
    if gz.is_file() {
        Some(gz)
    } else {
        None
    }
}

fn required(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    locate(dir, name).with_context(|| format!("{} not found in {}", name, dir.display()))
}

fn parse_num<T: std::str::FromStr>(file: &str, line: usize, word: &str) -> Result<T, AssemblyError> {
    word.parse::<T>()
        .map_err(|_| AssemblyError::parse(file, line, format!("expecting a number, got {}", word)))
}

fn expect_words(file: &str, line: usize, words: &[&str], n: usize) -> Result<(), AssemblyError> {
    if words.len() < n {
        return Err(AssemblyError::parse(
            file,
            line,
            format!("expecting {} words, got {}", n, words.len()),
        ));
    }
    Ok(())
}

/// Clones from the map info file.
///
/// The first line names the contig and must say `PLACED`. Phase 0 clones are excluded.
pub fn read_info(path: &Path) -> anyhow::Result<(Contig, Excluded)> {
    let file = path_str(path);
    let lines = crate::data_lines(&file)?;
    let Some((line_no, header)) = lines.first() else {
        return Err(AssemblyError::parse(&file, 1, "empty info file").into());
    };
    let words: Vec<&str> = header.split_whitespace().collect();
    if words.len() < 2 {
        return Err(AssemblyError::parse(&file, *line_no, "bad header").into());
    }
    if !words[1].eq_ignore_ascii_case("PLACED") {
        return Err(AssemblyError::parse(&file, *line_no, "doesn't have type PLACED").into());
    }

    let mut contig = Contig::new(words[0]);
    let mut excluded = Excluded::default();
    for (line_no, line) in lines.iter().skip(1) {
        let words: Vec<&str> = line.split_whitespace().collect();
        expect_words(&file, *line_no, &words, 4)?;
        let acc = words[0];
        if contig.clone_id(acc).is_some() || excluded.contains(acc) {
            log::warn!("Duplicate {} in {}, ignoring all but first", acc, file);
            continue;
        }
        let map_kb: i32 = parse_num(&file, *line_no, words[1])?;
        let code: i32 = parse_num(&file, *line_no, words[2])?;
        let flip: i32 = parse_num(&file, *line_no, words[3])?;
        let phase = Phase::from_code(code)
            .ok_or_else(|| AssemblyError::parse(&file, *line_no, format!("unknown phase {}", code)))?;
        if phase == Phase::Survey {
            excluded.insert(acc.to_string());
            continue;
        }
        contig.add_clone(acc, map_kb * 1000, phase, flip);
    }
    log::info!("{}: {} clones, {} excluded", contig.name, contig.clones.len(), excluded.len());

    Ok((contig, excluded))
}

/// Accession of a clone's FASTA file: the file name without `.gz` and its extension.
pub fn accession_of(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rfind('.') {
        Some(i) if i > 0 => name[..i].to_string(),
        _ => name.to_string(),
    }
}

/// Loads the fragments of every clone listed in `geno.lst`.
///
/// Fragments follow each other inside their clone in file order.
pub fn read_geno(contig: &mut Contig, excluded: &Excluded, list: &Path, dir: &Path) -> anyhow::Result<()> {
    let list_file = path_str(list);
    let mut files = vec![];
    for line in crate::reader(&list_file)?.lines() {
        let line = line.with_context(|| format!("could not read {}", list_file))?;
        files.extend(line.split_whitespace().map(|w| w.to_string()));
    }
    if files.is_empty() {
        return Err(AssemblyError::parse(&list_file, 1, "no sequence files listed").into());
    }

    let mut seen = FxHashSet::default();
    for file in files {
        let path = if Path::new(&file).is_absolute() {
            PathBuf::from(&file)
        } else {
            dir.join(&file)
        };
        if !path.is_file() {
            return Err(anyhow::anyhow!("No sequence for {}", accession_of(&path)))
                .with_context(|| format!("{} listed in {}", file, list_file));
        }
        let acc = accession_of(&path);
        let clone = contig.clone_id(&acc);
        if clone.is_some() && !seen.insert(acc.clone()) {
            log::warn!("Duplicate {} in {}, ignoring all but first", acc, list_file);
            continue;
        }

        let reader = crate::reader(&path_str(&path))?;
        let mut fa_in = noodles_fasta::io::Reader::new(reader);
        for result in fa_in.records() {
            let record = result.with_context(|| format!("could not read {}", path.display()))?;
            let name = String::from_utf8(record.name().into())?;
            let seq: Vec<u8> = record.sequence().as_ref().to_vec();

            let Some(c) = clone else {
                if !excluded.contains(&acc) {
                    log::warn!("{} is not in the map, ignoring {}", acc, name);
                }
                contig.ignore_fragment(&name);
                continue;
            };
            if seq.is_empty() {
                log::warn!("{} has no bases, ignoring", name);
                contig.ignore_fragment(&name);
                continue;
            }
            if contig.add_fragment(c, &name, seq).is_none() {
                log::warn!("Duplicate {}, ignoring all but first", name);
            }
        }
    }
    log::info!("{} fragments loaded", contig.frags.len());

    Ok(())
}

/// One barge per line of `+(acc`, `-(acc`, `?(acc` and `acc)` tokens.
pub fn read_barges(contig: &mut Contig, excluded: &Excluded, path: &Path) -> anyhow::Result<()> {
    let file = path_str(path);
    for (line_no, line) in crate::data_lines(&file)? {
        let mut ends = vec![];
        for word in line.split_whitespace() {
            let (acc, start) = if let Some(caps) = START_RE.captures(word) {
                let orientation: i8 = match &caps[1] {
                    "+" => 1,
                    "-" => -1,
                    _ => 0,
                };
                (caps[2].to_string(), Some(orientation))
            } else if let Some(caps) = END_RE.captures(word) {
                (caps[1].to_string(), None)
            } else {
                return Err(AssemblyError::parse(
                    &file,
                    line_no,
                    format!("can't parse clone end {}", word),
                )
                .into());
            };

            if excluded.contains(&acc) {
                continue;
            }
            let clone = contig
                .clone_id(&acc)
                .ok_or(AssemblyError::UnknownClone { name: acc })
                .with_context(|| format!("line {} of {}", line_no, file))?;
            ends.push(match start {
                Some(orientation) => CloneEnd::Start { clone, orientation },
                None => CloneEnd::End { clone },
            });
        }
        if ends.is_empty() {
            continue;
        }
        contig
            .add_barge(ends)
            .with_context(|| format!("line {} of {}", line_no, file))?;
    }
    log::info!("{} barges", contig.barges.len());

    Ok(())
}

/// Clone overlaps in bases. The strict overlap in column 8 wins unless it is zero.
pub fn read_clone_overlaps(contig: &mut Contig, path: &Path) -> anyhow::Result<usize> {
    let file = path_str(path);
    let mut count = 0;
    for (line_no, line) in crate::data_lines(&file)? {
        let words: Vec<&str> = line.split_whitespace().collect();
        expect_words(&file, line_no, &words, 10)?;
        let (Some(a), Some(b)) = (contig.clone_id(words[0]), contig.clone_id(words[4])) else {
            continue;
        };
        let mut overlap: i32 = parse_num(&file, line_no, words[8])?;
        if overlap == 0 {
            overlap = parse_num(&file, line_no, words[9])?;
        }
        contig.set_clone_overlap(a, b, overlap);
        count += 1;
    }

    Ok(count)
}

/// Alignment records. Header lines and anything else not starting with a digit are skipped.
pub fn read_psls(path: &Path) -> anyhow::Result<Vec<Psl>> {
    let file = path_str(path);
    let mut psls = vec![];
    for (i, line) in crate::reader(&file)?.lines().enumerate() {
        let line = line.with_context(|| format!("could not read {}", file))?;
        if !line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let psl: Psl = line
            .parse()
            .map_err(|e: anyhow::Error| AssemblyError::parse(&file, i + 1, e.to_string()))?;
        psls.push(psl);
    }
    log::info!("{} alignments in {}", psls.len(), file);

    Ok(psls)
}

/// `a b x min max` rows. A read may belong to one pair only.
pub fn read_ranged_pairs(path: &Path) -> anyhow::Result<Vec<Pair>> {
    let file = path_str(path);
    let mut names = FxHashSet::default();
    let mut pairs = vec![];
    for (line_no, line) in crate::data_lines(&file)? {
        let words: Vec<&str> = line.split_whitespace().collect();
        expect_words(&file, line_no, &words, 5)?;
        for name in &words[..2] {
            if !names.insert(name.to_string()) {
                return Err(AssemblyError::parse(&file, line_no, format!("duplicate read {}", name)).into());
            }
        }
        let min = parse_num(&file, line_no, words[3])?;
        let max = parse_num(&file, line_no, words[4])?;
        pairs.push(Pair::new(words[0], words[1], min, max));
    }
    log::info!("Got {} pairs in {}", pairs.len(), file);

    Ok(pairs)
}

/// `a b` rows, all sharing the configured end pair distance.
pub fn read_end_pairs(path: &Path, cfg: &AssemblyConfig) -> anyhow::Result<Vec<Pair>> {
    let file = path_str(path);
    let mut pairs = vec![];
    for (line_no, line) in crate::data_lines(&file)? {
        let words: Vec<&str> = line.split_whitespace().collect();
        expect_words(&file, line_no, &words, 2)?;
        pairs.push(Pair::new(words[0], words[1], cfg.end_pair_min, cfg.end_pair_max));
    }
    log::info!("Got {} pairs in {}", pairs.len(), file);

    Ok(pairs)
}

/// `a orientation b min max score` rows.
pub fn read_chains(path: &Path) -> anyhow::Result<Vec<Evidence>> {
    let file = path_str(path);
    let mut chains = vec![];
    for (line_no, line) in crate::data_lines(&file)? {
        let words: Vec<&str> = line.split_whitespace().collect();
        expect_words(&file, line_no, &words, 6)?;
        chains.push(Evidence::FragmentChain {
            a: words[0].to_string(),
            orientation: if words[1].starts_with('-') { -1 } else { 1 },
            b: words[2].to_string(),
            min: parse_num(&file, line_no, words[3])?,
            max: parse_num(&file, line_no, words[4])?,
            score: parse_num(&file, line_no, words[5])?,
        });
    }

    Ok(chains)
}

fn optional_psls(dir: &Path, name: &str) -> anyhow::Result<Vec<Psl>> {
    match locate(dir, name) {
        Some(path) => read_psls(&path),
        None => {
            log::info!("no {} in {}", name, dir.display());
            Ok(vec![])
        }
    }
}

fn paired(pairs: Vec<Pair>, dir: &Path, psl_name: &str) -> anyhow::Result<Vec<Pair>> {
    let mut pairs = pairs;
    let psls = optional_psls(dir, psl_name)?;
    let n = attach_pair_psls(&mut pairs, psls);
    log::info!("{} of the {} alignments belong to a pair", n, psl_name);
    Ok(pairs)
}

/// Everything the assembler needs from one contig directory.
///
/// Evidence keeps the order mRNA, read pairs, fragment chains, EST, BAC end pairs.
pub fn load_dir(dir: &Path, cfg: &AssemblyConfig) -> anyhow::Result<AssemblyInput> {
    let (mut contig, excluded) = read_info(&required(dir, "info.mm")?)?;
    read_geno(&mut contig, &excluded, &required(dir, "geno.lst")?, dir)?;
    read_barges(&mut contig, &excluded, &required(dir, "mmEnds")?)?;
    if let Some(path) = locate(dir, "cloneOverlap") {
        read_clone_overlaps(&mut contig, &path)?;
    }

    let self_psls = optional_psls(dir, "self.psl")?;

    let mut evidence = group_transcripts(CableKind::Mrna, optional_psls(dir, "mrna.psl")?);
    if let Some(path) = locate(dir, "readPairs") {
        let pairs = paired(read_ranged_pairs(&path)?, dir, "pairedReads.psl")?;
        evidence.extend(pairs.into_iter().map(Evidence::PairedRead));
    }
    if let Some(path) = locate(dir, "fragChains") {
        evidence.extend(read_chains(&path)?);
    }
    evidence.extend(group_transcripts(CableKind::Est, optional_psls(dir, "est.psl")?));
    if let Some(path) = locate(dir, "bacEndPairs") {
        let pairs = paired(read_end_pairs(&path, cfg)?, dir, "bacEnd.psl")?;
        evidence.extend(pairs.into_iter().map(Evidence::EndPair));
    }

    Ok(AssemblyInput {
        contig,
        self_psls,
        evidence,
    })
}
