//! End to end: rafts, bridges, order, golden path, and the files describing them.

use crate::libs::oo::bridge::BridgeGraph;
use crate::libs::oo::config::AssemblyConfig;
use crate::libs::oo::diag::Diagnostics;
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::evidence::{collect_lines, map_hints, Evidence};
use crate::libs::oo::golden::{assemble, GoldenPath};
use crate::libs::oo::model::Contig;
use crate::libs::oo::order::{flip_near_defaults, order_rafts, set_default_positions, set_flip_tendencies};
use crate::libs::oo::overlap::barge_edges;
use crate::libs::oo::raft::{build_rafts, RaftId, RaftSet};
use crate::libs::oo::report;
use crate::libs::psl::Psl;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::Path;

/// What the loader hands to the assembler.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    pub contig: Contig,
    pub self_psls: Vec<Psl>,
    /// In file order; map hints are added once rafts exist
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub frags: usize,
    pub clones: usize,
    pub barges: usize,
    pub overlap_edges: usize,
    pub rafts: usize,
    /// Fragments in rafts of more than one fragment
    pub rafted_frags: usize,
    pub lines: usize,
    pub lines_accepted: usize,
    pub lines_conflicted: usize,
    pub flipped: usize,
    pub golden_bases: i32,
}

impl fmt::Display for AssemblyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frags\t{}", self.frags)?;
        writeln!(f, "clones\t{}", self.clones)?;
        writeln!(f, "barges\t{}", self.barges)?;
        writeln!(f, "overlap edges\t{}", self.overlap_edges)?;
        writeln!(f, "rafts\t{} ({} frags rafted)", self.rafts, self.rafted_frags)?;
        writeln!(
            f,
            "lines\t{} ({} ok, {} conflicted)",
            self.lines, self.lines_accepted, self.lines_conflicted
        )?;
        writeln!(f, "flipped components\t{}", self.flipped)?;
        write!(f, "golden path\t{} bases", self.golden_bases)
    }
}

/// Overlap edges and rafts, with default positions and flip tendencies set as if
/// every barge gap were bridged.
pub fn raft_stage(
    contig: &mut Contig,
    self_psls: &[Psl],
    cfg: &AssemblyConfig,
    diag: &mut dyn Diagnostics,
) -> Result<RaftSet, AssemblyError> {
    let (edges, per_barge) = barge_edges(contig, self_psls, cfg)?;
    log::info!("{} overlap edges from {} alignments", edges.len(), self_psls.len());
    let mut rafts = build_rafts(contig, edges, &per_barge, cfg, diag);

    contig.calc_positions(|_, _| true, cfg);
    set_default_positions(contig, &mut rafts);
    set_flip_tendencies(contig, &mut rafts);
    Ok(rafts)
}

/// Fragments of rafts holding more than one.
pub fn rafted_frags(rafts: &RaftSet) -> usize {
    rafts
        .live()
        .iter()
        .map(|&r| rafts.rafts[r].frags.len())
        .filter(|&n| n > 1)
        .sum()
}

/// A finished assembly.
pub struct Assembly {
    pub contig: Contig,
    /// Rafts as ordered and oriented, before paths were stitched through them
    pub placed: RaftSet,
    /// Rafts turned forward by path building
    pub rafts: RaftSet,
    pub bridges: BridgeGraph,
    pub order: Vec<RaftId>,
    pub golden: GoldenPath,
    pub stats: AssemblyStats,
}

impl Assembly {
    pub fn run(
        input: AssemblyInput,
        cfg: &AssemblyConfig,
        diag: &mut dyn Diagnostics,
    ) -> Result<Self, AssemblyError> {
        let AssemblyInput {
            mut contig,
            self_psls,
            evidence,
        } = input;
        let mut stats = AssemblyStats {
            frags: contig.frags.len(),
            clones: contig.clones.len(),
            barges: contig.barges.len(),
            ..Default::default()
        };

        let mut rafts = raft_stage(&mut contig, &self_psls, cfg, diag)?;
        stats.overlap_edges = rafts.edges.len();

        let mut all = map_hints(&rafts, cfg);
        log::info!("{} rafts with a strong map orientation", all.len());
        all.extend(evidence);
        let mut lines = collect_lines(&all, &contig, &rafts, cfg, diag)?;
        stats.lines = lines.len();

        let mut bridges = BridgeGraph::skeleton(&contig, &rafts, diag);
        let counts = bridges.add_lines(&mut lines, &mut rafts, cfg, diag)?;
        stats.lines_accepted = counts.accepted;
        stats.lines_conflicted = counts.conflicted;

        contig.calc_positions(|a, b| bridges.barges_bridged(a, b), cfg);
        set_default_positions(&contig, &mut rafts);
        for r in rafts.live() {
            rafts.rafts[r].normalize(&contig);
        }

        stats.flipped = flip_near_defaults(&mut bridges, &mut rafts, cfg, diag);
        let order = order_rafts(&bridges, &contig, &rafts)?;
        stats.rafts = order.len();
        stats.rafted_frags = rafted_frags(&rafts);

        let placed = rafts.clone();
        let golden = assemble(&order, &contig, &mut rafts, &bridges, cfg, diag)?;
        stats.golden_bases = golden.size();

        Ok(Self {
            contig,
            placed,
            rafts,
            bridges,
            order,
            golden,
            stats,
        })
    }

    /// Rafts in golden path order with the orientation they were placed in.
    pub fn raft_order(&self) -> Vec<(RaftId, i8)> {
        self.order
            .iter()
            .map(|&r| (r, self.placed.rafts[r].orientation))
            .collect()
    }

    /// Writes every report into `outdir`, which must exist.
    pub fn write_outputs(&self, outdir: &Path) -> anyhow::Result<()> {
        let contig = &self.contig;
        save(outdir, "gold", |out| Ok(report::write_gold(out, contig, &self.golden)?))?;
        save(outdir, &format!("{}.fa", contig.name), |out| {
            report::write_fasta(out, contig, &self.golden)?;
            Ok(())
        })?;
        save(outdir, "gl", |out| {
            Ok(report::write_layout(out, contig, &self.rafts, &self.bridges, &self.golden)?)
        })?;
        save(outdir, "ooGreedy.gl", |out| {
            Ok(report::write_gl(out, contig, &self.rafts, &self.golden)?)
        })?;
        save(outdir, "raft", |out| Ok(report::write_rafts(out, contig, &self.placed)?))?;
        save(outdir, "barge", |out| Ok(report::write_barges(out, contig, &self.bridges)?))?;
        save(outdir, "graph", |out| Ok(report::write_graph(out, &self.bridges, &self.placed)?))?;
        save(outdir, "graph.json", |out| report::write_graph_json(out, &self.bridges, &self.placed))?;
        save(outdir, "raft.psl", |mut out| Ok(report::write_raft_psl(&mut out, &self.placed)?))?;
        save(outdir, "fragMap", |out| Ok(report::write_frag_map(out, contig)?))?;
        save(outdir, "raftOrder", |out| {
            Ok(report::write_raft_order(out, &self.raft_order(), &self.placed)?)
        })?;
        Ok(())
    }
}

/// Opens `outdir/name`, lets `f` fill it and flushes.
pub fn save<F>(outdir: &Path, name: &str, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut dyn Write) -> anyhow::Result<()>,
{
    let path = outdir.join(name);
    let mut writer = crate::writer(&path.to_string_lossy())?;
    f(writer.as_mut())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::oo::diag::MemoryDiagnostics;
    use crate::libs::oo::golden::tests::{genome, tiled};
    use crate::libs::oo::golden::Segment;
    use crate::libs::oo::loader::{load_dir, tests::write_dir};
    use crate::libs::oo::model::FragId;
    use crate::libs::oo::range::is_consistent;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn assembled(extra: &[(&str, &str)]) -> (Assembly, Vec<u8>, MemoryDiagnostics) {
        let dir = tempfile::tempdir().unwrap();
        let genome = genome(6500, 5);
        write_dir(dir.path(), &genome);
        for (name, content) in extra {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let cfg = AssemblyConfig::default();
        let input = load_dir(dir.path(), &cfg).unwrap();
        let mut diag = MemoryDiagnostics::new();
        let assembly = Assembly::run(input, &cfg, &mut diag).unwrap();
        (assembly, genome, diag)
    }

    /// Runs of overlapping pieces with uncovered stretches between them.
    ///
    /// Returns the genome, the pieces and the run of each piece.
    fn random_tiling(rng: &mut SmallRng) -> (Vec<u8>, Vec<(usize, usize, bool)>, Vec<usize>) {
        let mut pieces = vec![];
        let mut runs = vec![];
        let mut pos = 0;
        for run in 0..rng.gen_range(1..=3) {
            if run > 0 {
                pos += rng.gen_range(500..2000);
            }
            for i in 0..rng.gen_range(1..=4) {
                let start = if i == 0 { pos } else { pos - rng.gen_range(200..600) };
                let end = start + rng.gen_range(1500..3000);
                pieces.push((start, end, rng.gen_bool(0.3)));
                runs.push(run);
                pos = end;
            }
        }
        (genome(pos, rng.gen()), pieces, runs)
    }

    fn random_chains(rng: &mut SmallRng, runs: &[usize]) -> Vec<Evidence> {
        let mut chains = vec![];
        for _ in 0..rng.gen_range(0..5) {
            let (a, b) = (rng.gen_range(0..runs.len()), rng.gen_range(0..runs.len()));
            if runs[a] == runs[b] {
                continue;
            }
            let min = rng.gen_range(0..3000);
            chains.push(Evidence::FragmentChain {
                a: format!("AC{}_1", a + 1),
                orientation: if rng.gen_bool(0.5) { 1 } else { -1 },
                b: format!("AC{}_1", b + 1),
                min,
                max: min + rng.gen_range(0..5000),
                score: rng.gen_range(10..300),
            });
        }
        chains
    }

    #[test]
    fn test_run() {
        let (assembly, genome, _) = assembled(&[]);
        let stats = &assembly.stats;
        assert_eq!(stats.frags, 3);
        assert_eq!(stats.overlap_edges, 1);
        assert_eq!(stats.rafts, 2);
        assert_eq!(stats.rafted_frags, 2);
        assert_eq!(stats.lines, 0);

        // two barges, nothing links them
        assert_eq!(stats.golden_bases, 2200 + 100000 + 1000);
        assert_eq!(
            assembly.golden.segments[2],
            Segment::Gap {
                size: 100000,
                gap_type: crate::libs::oo::golden::GapType::Clone,
                bridged: false,
            }
        );

        let seq = assembly.golden.sequence(&assembly.contig);
        let first = &seq[..2200];
        let rc = bio::alphabets::dna::revcomp(&genome[..2200]);
        assert!(first == &genome[..2200] || first == rc.as_slice());
        assert_eq!(&seq[102200..], &genome[5000..6000]);
    }

    #[test]
    fn test_chain_bridges_barges() {
        let (assembly, _, diag) = assembled(&[("fragChains", "AC2_1 + AC3_1 1000 5000 50\n")]);
        assert_eq!(assembly.stats.lines, 1);
        assert_eq!(assembly.stats.lines_accepted, 1);
        assert_eq!(diag.tally.rejected_total(), 0);
        assert!(assembly.bridges.barges_bridged(0, 1));
        assert_eq!(assembly.stats.golden_bases, 2200 + 50000 + 1000);
        assert!(matches!(
            assembly.golden.segments[2],
            Segment::Gap { bridged: true, .. }
        ));
    }

    #[test]
    fn test_write_outputs() {
        let (assembly, _, _) = assembled(&[]);
        let out = tempfile::tempdir().unwrap();
        assembly.write_outputs(out.path()).unwrap();

        for name in [
            "gold",
            "ctg7.fa",
            "gl",
            "ooGreedy.gl",
            "raft",
            "barge",
            "graph",
            "graph.json",
            "raft.psl",
            "fragMap",
            "raftOrder",
        ] {
            assert!(out.path().join(name).is_file(), "{} missing", name);
        }
        let gold = std::fs::read_to_string(out.path().join("gold")).unwrap();
        assert_eq!(gold.lines().count(), 4);
        assert!(gold.contains("\tN\t100000\tclone\tno"));

        let order = std::fs::read_to_string(out.path().join("raftOrder")).unwrap();
        assert_eq!(order.lines().count(), 2);
        assert!(assembly.stats.to_string().ends_with("golden path\t103200 bases"));
    }

    #[test]
    fn test_random_tilings() {
        let cfg = AssemblyConfig::default();
        for seed in 0..40 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let (genome, pieces, runs) = random_tiling(&mut rng);
            let (contig, psls) = tiled(&genome, &pieces);
            let chains = random_chains(&mut rng, &runs);
            let run_count = runs.last().map_or(0, |r| r + 1);

            // one raft per run, every piece in exactly one
            let mut diag = MemoryDiagnostics::new();
            let mut staged = contig.clone();
            let mut rafts = raft_stage(&mut staged, &psls, &cfg, &mut diag).unwrap();
            assert_eq!(rafts.live().len(), run_count, "seed {}", seed);
            let mut seen = vec![0; pieces.len()];
            for r in rafts.live() {
                let run = runs[rafts.rafts[r].frags[0].frag];
                for rf in &rafts.rafts[r].frags {
                    seen[rf.frag] += 1;
                    assert_eq!(runs[rf.frag], run, "seed {}", seed);
                }
            }
            assert!(seen.iter().all(|&n| n == 1), "seed {}", seed);

            // the raft graph stays acyclic and satisfiable after every line
            let mut all = map_hints(&rafts, &cfg);
            all.extend(chains.iter().cloned());
            let mut lines = collect_lines(&all, &staged, &rafts, &cfg, &mut diag).unwrap();
            let mut bridges = BridgeGraph::skeleton(&staged, &rafts, &mut diag);
            for line in lines.iter_mut() {
                bridges.add_line(line, &mut rafts, &cfg, &mut diag).unwrap();
                let graph = &bridges.graph;
                assert!(!graph.has_cycles(), "seed {}", seed);
                assert!(
                    is_consistent(graph.graph.node_count(), &graph.range_edges()),
                    "seed {}",
                    seed
                );
            }

            // each raft path spells its run of the genome
            let input = AssemblyInput {
                contig,
                self_psls: psls,
                evidence: chains,
            };
            let assembly = Assembly::run(input, &cfg, &mut MemoryDiagnostics::new()).unwrap();
            assert_eq!(assembly.golden.raft_paths.len(), run_count, "seed {}", seed);
            let mut used = vec![0; pieces.len()];
            for path in &assembly.golden.raft_paths {
                let frags: Vec<FragId> = path
                    .segments
                    .iter()
                    .filter_map(|s| match s {
                        Segment::Fragment(span) => Some(span.frag),
                        _ => None,
                    })
                    .collect();
                for &f in &frags {
                    used[f] += 1;
                }
                let run = runs[frags[0]];
                let first = runs.iter().position(|&r| r == run).unwrap();
                let last = runs.iter().rposition(|&r| r == run).unwrap();
                let expected = &genome[pieces[first].0..pieces[last].1];

                let seq = GoldenPath {
                    raft_paths: vec![],
                    segments: path.segments.clone(),
                }
                .sequence(&assembly.contig);
                let rc = bio::alphabets::dna::revcomp(expected);
                assert!(seq == expected || seq == rc, "seed {}", seed);
            }
            assert!(used.iter().all(|&n| n == 1), "seed {}", seed);
        }
    }
}
