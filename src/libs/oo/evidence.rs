//! Long range evidence and its reduction to line graphs.
//!
//! A line graph is an ordered run of raft links, each carrying the orientation and
//! position at which the evidence hits the raft.

use crate::libs::oo::config::{AssemblyConfig, DUMMY_MAX};
use crate::libs::oo::diag::{Diagnostics, Rejection};
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::graph::CableKind;
use crate::libs::oo::model::{Contig, FragId};
use crate::libs::oo::overlap::frag_passes;
use crate::libs::oo::raft::{RaftFrag, RaftId, RaftSet};
use crate::libs::psl::Psl;
use fxhash::FxHashMap;
use indexmap::IndexMap;

/// What a link attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    Anchor,
    Raft(RaftId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLink {
    pub name: String,
    pub member: Member,
    pub orientation: i8,
    /// Raft coordinate of the hit
    pub position: i32,
    pub score: i32,
}

/// Rafts in the order one piece of evidence visits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineGraph {
    pub kind: CableKind,
    pub score: i32,
    pub min: i32,
    pub max: i32,
    pub links: Vec<LineLink>,
}

impl LineGraph {
    /// Read the line from the other end.
    pub fn reverse(&mut self) {
        for link in self.links.iter_mut() {
            link.orientation = -link.orientation;
        }
        self.links.reverse();
    }

    pub fn label(&self) -> String {
        let names: Vec<&str> = if self.kind.is_transcript() {
            self.links.iter().take(1).map(|l| l.name.as_str()).collect()
        } else {
            self.links.iter().map(|l| l.name.as_str()).collect()
        };
        format!("{} {} score {}", self.kind.name(), names.join(" "), self.score)
    }
}

/// A read pair or BAC end pair with the alignments of both ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pair {
    pub a: String,
    pub b: String,
    pub min: i32,
    pub max: i32,
    pub a_psls: Vec<Psl>,
    pub b_psls: Vec<Psl>,
}

impl Pair {
    pub fn new(a: &str, b: &str, min: i32, max: i32) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
            min,
            max,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// Alignments of one mRNA or EST, sorted by query start
    Transcript {
        kind: CableKind,
        name: String,
        psls: Vec<Psl>,
    },
    PairedRead(Pair),
    EndPair(Pair),
    FragmentChain {
        a: String,
        orientation: i8,
        b: String,
        min: i32,
        max: i32,
        score: i32,
    },
    /// Orientation suggested by the map for a raft with a strong flip tendency
    MapHint { raft: RaftId, tendency: i32 },
}

/// Groups transcript alignments by query, keeping the order in which queries first appear.
pub fn group_transcripts(kind: CableKind, psls: Vec<Psl>) -> Vec<Evidence> {
    let mut groups: IndexMap<String, Vec<Psl>> = IndexMap::new();
    for psl in psls {
        groups.entry(psl.q_name.clone()).or_default().push(psl);
    }
    groups
        .into_iter()
        .map(|(name, mut psls)| {
            psls.sort_by_key(|p| p.q_start);
            Evidence::Transcript { kind, name, psls }
        })
        .collect()
}

/// Hands every alignment to the pair end it belongs to. Returns how many found a pair.
pub fn attach_pair_psls(pairs: &mut [Pair], psls: Vec<Psl>) -> usize {
    let mut ends: FxHashMap<String, (usize, bool)> = FxHashMap::default();
    for (i, pair) in pairs.iter().enumerate() {
        ends.entry(pair.a.clone()).or_insert((i, true));
        ends.entry(pair.b.clone()).or_insert((i, false));
    }

    let mut paired = 0;
    for psl in psls {
        if let Some(&(i, is_a)) = ends.get(&psl.q_name) {
            paired += 1;
            if is_a {
                pairs[i].a_psls.push(psl);
            } else {
                pairs[i].b_psls.push(psl);
            }
        }
    }
    paired
}

/// Map hints for every raft whose flip tendency is large enough to trust.
pub fn map_hints(rafts: &RaftSet, cfg: &AssemblyConfig) -> Vec<Evidence> {
    rafts
        .live()
        .into_iter()
        .filter(|&r| rafts.rafts[r].flip_tendency.abs() > cfg.big_raft_tendency)
        .map(|r| Evidence::MapHint {
            raft: r,
            tendency: rafts.rafts[r].flip_tendency,
        })
        .collect()
}

/// Score of one transcript alignment. Introns are free.
pub fn transcript_psl_score(psl: &Psl, cfg: &AssemblyConfig) -> i32 {
    let sc = &cfg.scoring;
    let m = psl.match_count as i32;
    let mut score = (sc.match_log_weight * (1.0 + m as f64).ln()
        + (1.0 + psl.rep_match as f64).ln()
        - sc.transcript_milli_bad_weight * psl.milli_bad(true) as f64) as i32;
    if m <= sc.transcript_low_match {
        score -= (sc.transcript_low_match - m) * sc.low_match_penalty;
    }
    score - sc.transcript_link_penalty
}

/// Score of one read end alignment. Unaligned tails count against it.
pub fn end_psl_score(psl: &Psl, cfg: &AssemblyConfig) -> i32 {
    let sc = &cfg.scoring;
    let m = psl.match_count as i32;
    let mut score = (sc.match_log_weight * (1.0 + m as f64).ln()
        + (1.0 + psl.rep_match as f64).ln()
        - sc.end_milli_bad_weight * psl.milli_bad(false) as f64
        - sc.end_tail_weight * psl.tails() as f64) as i32;
    if m <= sc.low_match_count {
        score -= (sc.low_match_count - m) * sc.low_match_penalty;
    }
    score
}

/// Centre of the target side of `psl` in raft coordinates.
pub fn raft_position(psl: &Psl, rf: &RaftFrag, frag_size: i32) -> i32 {
    let mut center = (psl.t_start + psl.t_end) / 2;
    if rf.orientation < 0 {
        center = frag_size - center;
    }
    center + rf.offset
}

/// Target fragment of `psl` when it takes part in assembly.
fn usable_target(
    contig: &Contig,
    psl: &Psl,
    cfg: &AssemblyConfig,
) -> Result<Option<FragId>, AssemblyError> {
    Ok(contig
        .resolve_frag(&psl.t_name)?
        .filter(|&f| frag_passes(contig, f, cfg)))
}

fn placed(rafts: &RaftSet, frag: FragId) -> Result<(RaftId, RaftFrag), AssemblyError> {
    rafts
        .raft_frag(frag)
        .ok_or_else(|| AssemblyError::Internal(format!("fragment {} is in no raft", frag)))
}

impl Evidence {
    pub fn kind(&self) -> CableKind {
        match self {
            Evidence::Transcript { kind, .. } => *kind,
            Evidence::PairedRead(_) => CableKind::ReadPair,
            Evidence::EndPair(_) => CableKind::BacEndPair,
            Evidence::FragmentChain { .. } => CableKind::Chain,
            Evidence::MapHint { .. } => CableKind::BigRaft,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Evidence::Transcript { name, .. } => name.clone(),
            Evidence::PairedRead(p) | Evidence::EndPair(p) => format!("{}/{}", p.a, p.b),
            Evidence::FragmentChain { a, b, .. } => format!("{}/{}", a, b),
            Evidence::MapHint { raft, .. } => format!("raft {}", raft + 1),
        }
    }

    /// The line graph this evidence stands for, or `None` when it is too weak to use.
    pub fn reduce(
        &self,
        contig: &Contig,
        rafts: &RaftSet,
        cfg: &AssemblyConfig,
        diag: &mut dyn Diagnostics,
    ) -> Result<Option<LineGraph>, AssemblyError> {
        let outcome = match self {
            Evidence::Transcript { kind, name, psls } => {
                transcript_line(*kind, name, psls, contig, rafts, cfg)?
            }
            Evidence::PairedRead(pair) => pair_line(pair, CableKind::ReadPair, contig, rafts, cfg)?,
            Evidence::EndPair(pair) => pair_line(pair, CableKind::BacEndPair, contig, rafts, cfg)?,
            Evidence::FragmentChain {
                a,
                orientation,
                b,
                min,
                max,
                score,
            } => chain_line(a, *orientation, b, *min, *max, *score, contig, rafts)?,
            Evidence::MapHint { raft, tendency } => hint_line(rafts, *raft, *tendency),
        };

        match outcome {
            Ok(line) => Ok(Some(line)),
            Err(why) => {
                diag.record_rejection(
                    Rejection::WeakEvidence,
                    &format!("{} {}: {}", self.kind().name(), self.name(), why),
                );
                Ok(None)
            }
        }
    }
}

type Reduced = Result<LineGraph, &'static str>;

fn transcript_line(
    kind: CableKind,
    name: &str,
    psls: &[Psl],
    contig: &Contig,
    rafts: &RaftSet,
    cfg: &AssemblyConfig,
) -> Result<Reduced, AssemblyError> {
    let sc = &cfg.scoring;
    let mut links = vec![];
    for psl in psls {
        let Some(frag) = usable_target(contig, psl, cfg)? else {
            continue;
        };
        let (r, rf) = placed(rafts, frag)?;
        links.push(LineLink {
            name: name.to_string(),
            member: Member::Raft(r),
            orientation: psl.orientation() * rf.orientation,
            position: raft_position(psl, &rf, contig.frags[frag].size),
            score: transcript_psl_score(psl, cfg),
        });
    }
    if links.is_empty() {
        return Ok(Err("no usable alignments"));
    }

    // the first of the best scoring links on each raft
    let mut best: IndexMap<Member, usize> = IndexMap::new();
    for (i, link) in links.iter().enumerate() {
        let slot = best.entry(link.member).or_insert(i);
        if links[*slot].score < link.score {
            *slot = i;
        }
    }
    let very_best = links.iter().map(|l| l.score).max().unwrap_or(i32::MIN);
    if very_best < sc.transcript_reject_below {
        return Ok(Err("no alignment scores well"));
    }
    let threshold = very_best - sc.transcript_keep_within;
    let keep: Vec<bool> = (0..links.len())
        .map(|i| best.get(&links[i].member) == Some(&i) && links[i].score >= threshold)
        .collect();
    let links: Vec<LineLink> = links
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(l, _)| l)
        .collect();
    if links.len() < 2 {
        return Ok(Err("hits only one raft"));
    }

    let n = links.len() as i32;
    let total: i32 = links.iter().map(|l| l.score).sum();
    let min = links.iter().map(|l| l.score).min().unwrap_or(0);
    let average = (total + n / 2) / n;
    let adjust = if kind == CableKind::Mrna {
        sc.mrna_adjust
    } else {
        sc.est_adjust
    };

    Ok(Ok(LineGraph {
        kind,
        score: (average + min) / 2 + adjust,
        min: 0,
        max: cfg.transcript_max_distance,
        links,
    }))
}

/// Best scoring usable alignment of one read end. Ties keep the earlier alignment.
fn best_end<'a>(
    psls: &'a [Psl],
    contig: &Contig,
    cfg: &AssemblyConfig,
) -> Result<Option<(&'a Psl, FragId, i32)>, AssemblyError> {
    let mut best: Option<(&Psl, FragId, i32)> = None;
    for psl in psls {
        let Some(frag) = usable_target(contig, psl, cfg)? else {
            continue;
        };
        let score = end_psl_score(psl, cfg);
        if best.map_or(true, |(_, _, s)| score > s) {
            best = Some((psl, frag, score));
        }
    }
    Ok(best)
}

fn pair_line(
    pair: &Pair,
    kind: CableKind,
    contig: &Contig,
    rafts: &RaftSet,
    cfg: &AssemblyConfig,
) -> Result<Reduced, AssemblyError> {
    let sc = &cfg.scoring;
    let (Some((a_psl, a_frag, a_score)), Some((b_psl, b_frag, b_score))) = (
        best_end(&pair.a_psls, contig, cfg)?,
        best_end(&pair.b_psls, contig, cfg)?,
    ) else {
        return Ok(Err("an end does not align"));
    };
    let (a_raft, a_rf) = placed(rafts, a_frag)?;
    let (b_raft, b_rf) = placed(rafts, b_frag)?;
    if a_raft == b_raft {
        return Ok(Err("both ends in one raft"));
    }

    let dif = contig.max_map_dif(contig.frags[a_frag].clone, contig.frags[b_frag].clone);
    if dif > cfg.max_map_deviation {
        return Ok(Err("ends too far apart on the map"));
    }
    let mut score = a_score.min(b_score);
    if kind == CableKind::BacEndPair {
        if score < cfg.min_end_pair_score {
            return Ok(Err("end alignment too weak"));
        }
        score += sc.end_pair_adjust;
    }
    if dif > cfg.free_map_deviation {
        score -= (dif - cfg.free_map_deviation) / sc.map_dif_divisor;
    }

    let links = vec![
        LineLink {
            name: pair.a.clone(),
            member: Member::Raft(a_raft),
            orientation: a_psl.orientation() * a_rf.orientation,
            position: raft_position(a_psl, &a_rf, contig.frags[a_frag].size),
            score: a_score,
        },
        LineLink {
            name: pair.b.clone(),
            member: Member::Raft(b_raft),
            orientation: -b_psl.orientation() * b_rf.orientation,
            position: raft_position(b_psl, &b_rf, contig.frags[b_frag].size),
            score: b_score,
        },
    ];
    Ok(Ok(LineGraph {
        kind,
        score,
        min: pair.min,
        max: pair.max,
        links,
    }))
}

#[allow(clippy::too_many_arguments)]
fn chain_line(
    a: &str,
    orientation: i8,
    b: &str,
    min: i32,
    max: i32,
    score: i32,
    contig: &Contig,
    rafts: &RaftSet,
) -> Result<Reduced, AssemblyError> {
    let (Some(a_frag), Some(b_frag)) = (contig.resolve_frag(a)?, contig.resolve_frag(b)?) else {
        return Ok(Err("fragment of an excluded clone"));
    };
    let (a_raft, a_rf) = placed(rafts, a_frag)?;
    let (b_raft, b_rf) = placed(rafts, b_frag)?;
    if a_raft == b_raft {
        return Ok(Err("both fragments in one raft"));
    }

    let links = vec![
        LineLink {
            name: a.to_string(),
            member: Member::Raft(a_raft),
            orientation: a_rf.orientation,
            position: a_rf.offset + contig.frags[a_frag].size / 2,
            score,
        },
        LineLink {
            name: b.to_string(),
            member: Member::Raft(b_raft),
            orientation: orientation * b_rf.orientation,
            position: b_rf.offset + contig.frags[b_frag].size / 2,
            score,
        },
    ];
    Ok(Ok(LineGraph {
        kind: CableKind::Chain,
        score,
        min,
        max,
        links,
    }))
}

fn hint_line(rafts: &RaftSet, raft: RaftId, tendency: i32) -> Reduced {
    let score = tendency.abs() / 10000;
    let links = vec![
        LineLink {
            name: "fixed".to_string(),
            member: Member::Anchor,
            orientation: 1,
            position: 0,
            score,
        },
        LineLink {
            name: format!("raft_{}", rafts.rafts[raft].id),
            member: Member::Raft(raft),
            orientation: if tendency < 0 { -1 } else { 1 },
            position: 0,
            score,
        },
    ];
    Ok(LineGraph {
        kind: CableKind::BigRaft,
        score,
        min: 0,
        max: DUMMY_MAX,
        links,
    })
}

/// Reduces all evidence and sorts the lines best first, keeping input order among equals.
pub fn collect_lines(
    evidence: &[Evidence],
    contig: &Contig,
    rafts: &RaftSet,
    cfg: &AssemblyConfig,
    diag: &mut dyn Diagnostics,
) -> Result<Vec<LineGraph>, AssemblyError> {
    let mut lines = vec![];
    let mut counts: IndexMap<&'static str, usize> = IndexMap::new();
    for ev in evidence {
        if let Some(line) = ev.reduce(contig, rafts, cfg, diag)? {
            *counts.entry(line.kind.name()).or_insert(0) += 1;
            lines.push(line);
        }
    }
    lines.sort_by(|a, b| b.score.cmp(&a.score));

    let summary: Vec<String> = counts.iter().map(|(k, n)| format!("{} {}", n, k)).collect();
    log::info!("{} lines from {} pieces of evidence ({})", lines.len(), evidence.len(), summary.join(", "));
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::oo::diag::MemoryDiagnostics;
    use crate::libs::oo::model::tests::small_contig;

    fn singletons(contig: &Contig) -> RaftSet {
        let mut set = RaftSet::new(contig.frags.len(), vec![]);
        set.make_singletons(contig);
        set
    }

    fn reduce(ev: &Evidence) -> (Option<LineGraph>, MemoryDiagnostics) {
        let contig = small_contig();
        let rafts = singletons(&contig);
        let mut diag = MemoryDiagnostics::new();
        let line = ev
            .reduce(&contig, &rafts, &AssemblyConfig::default(), &mut diag)
            .unwrap();
        (line, diag)
    }

    #[test]
    fn test_transcript_scores() {
        let cfg = AssemblyConfig::default();
        // trunc(25 ln 501) - 10
        let psl = Psl::ungapped("BC1", 2000, 0, "AC1_1", 1000, 400, 500, "+");
        assert_eq!(transcript_psl_score(&psl, &cfg), 145);
        // trunc(25 ln 6) - 5 * 25 - 10
        let psl = Psl::ungapped("BC1", 2000, 0, "AC1_1", 1000, 400, 5, "+");
        assert_eq!(transcript_psl_score(&psl, &cfg), 44 - 125 - 10);
    }

    #[test]
    fn test_group_transcripts() {
        let psls = vec![
            Psl::ungapped("BC2", 2000, 900, "AC1_1", 1000, 0, 100, "+"),
            Psl::ungapped("BC1", 2000, 600, "AC3_1", 2000, 0, 300, "+"),
            Psl::ungapped("BC2", 2000, 100, "AC2_1", 3000, 0, 100, "+"),
        ];
        let groups = group_transcripts(CableKind::Est, psls);
        assert_eq!(groups.len(), 2);
        match &groups[0] {
            Evidence::Transcript { name, psls, kind } => {
                assert_eq!(name, "BC2");
                assert_eq!(*kind, CableKind::Est);
                assert_eq!(psls[0].t_name, "AC2_1");
            }
            _ => panic!("not a transcript"),
        }
    }

    #[test]
    fn test_transcript_line() {
        let mut weak = Psl::ungapped("BC1", 2000, 1000, "AC2_1", 3000, 0, 10, "+");
        weak.match_count = 10;
        weak.mismatch_count = 990;
        let ev = Evidence::Transcript {
            kind: CableKind::Mrna,
            name: "BC1".to_string(),
            psls: vec![
                Psl::ungapped("BC1", 2000, 0, "AC1_1", 1000, 400, 500, "+"),
                // weaker second hit on the same raft
                Psl::ungapped("BC1", 2000, 500, "AC1_1", 1000, 0, 100, "+"),
                Psl::ungapped("BC1", 2000, 600, "AC3_1", 2000, 0, 300, "+"),
                weak,
            ],
        };
        let (line, _) = reduce(&ev);
        let line = line.unwrap();
        assert_eq!(line.links.len(), 2);
        assert_eq!(line.links[0].member, Member::Raft(0));
        assert_eq!(line.links[0].position, 650);
        assert_eq!(line.links[1].member, Member::Raft(3));
        assert_eq!(line.links[1].position, 150);
        // scores 145 and 132: average 139, minimum 132, mRNA bonus 25
        assert_eq!(line.score, 135 + 25);
        assert_eq!((line.min, line.max), (0, 500000));
    }

    #[test]
    fn test_transcript_one_raft() {
        let ev = Evidence::Transcript {
            kind: CableKind::Est,
            name: "BC9".to_string(),
            psls: vec![Psl::ungapped("BC9", 800, 0, "AC2_1", 3000, 100, 800, "+")],
        };
        let (line, diag) = reduce(&ev);
        assert!(line.is_none());
        assert_eq!(diag.tally.rejected_of(Rejection::WeakEvidence), 1);
    }

    #[test]
    fn test_pairs() {
        let mut pairs = vec![Pair::new("r1", "r2", 1000, 5000)];
        let paired = attach_pair_psls(
            &mut pairs,
            vec![
                Psl::ungapped("r1", 500, 0, "AC1_1", 1000, 500, 500, "+"),
                Psl::ungapped("r2", 500, 0, "AC3_1", 2000, 0, 500, "-"),
                Psl::ungapped("r7", 500, 0, "AC3_1", 2000, 0, 500, "-"),
            ],
        );
        assert_eq!(paired, 2);

        let (line, _) = reduce(&Evidence::PairedRead(pairs[0].clone()));
        let line = line.unwrap();
        assert_eq!(line.kind, CableKind::ReadPair);
        assert_eq!(line.score, 155);
        assert_eq!((line.min, line.max), (1000, 5000));
        assert_eq!(line.links[0].orientation, 1);
        assert_eq!(line.links[0].position, 750);
        assert_eq!(line.links[1].orientation, 1);
        assert_eq!(line.links[1].position, 250);

        let (line, _) = reduce(&Evidence::EndPair(pairs[0].clone()));
        assert_eq!(line.unwrap().score, 105);

        // both ends on one raft
        let mut same = pairs[0].clone();
        same.b_psls = vec![Psl::ungapped("r2", 500, 0, "AC1_1", 1000, 0, 500, "-")];
        let (line, diag) = reduce(&Evidence::PairedRead(same));
        assert!(line.is_none());
        assert!(diag.contains("weak evidence"));
    }

    #[test]
    fn test_chain_and_hint() {
        let ev = Evidence::FragmentChain {
            a: "AC1_1".to_string(),
            orientation: -1,
            b: "AC3_1".to_string(),
            min: 100,
            max: 5000,
            score: 300,
        };
        let line = reduce(&ev).0.unwrap();
        assert_eq!(line.links[0].position, 500);
        assert_eq!(line.links[1].orientation, -1);
        assert_eq!(line.links[1].position, 1000);

        let contig = small_contig();
        let mut rafts = singletons(&contig);
        rafts.rafts[2].flip_tendency = -500000;
        let hints = map_hints(&rafts, &AssemblyConfig::default());
        assert_eq!(hints, vec![Evidence::MapHint { raft: 2, tendency: -500000 }]);

        let mut diag = MemoryDiagnostics::new();
        let line = hints[0]
            .reduce(&contig, &rafts, &AssemblyConfig::default(), &mut diag)
            .unwrap()
            .unwrap();
        assert_eq!(line.score, 50);
        assert_eq!(line.links[0].member, Member::Anchor);
        assert_eq!(line.links[1].name, "raft_3");
        assert_eq!(line.links[1].orientation, -1);
    }

    #[test]
    fn test_unknown_fragment_is_fatal() {
        let contig = small_contig();
        let rafts = singletons(&contig);
        let ev = Evidence::Transcript {
            kind: CableKind::Mrna,
            name: "BC1".to_string(),
            psls: vec![Psl::ungapped("BC1", 500, 0, "AC7_1", 1000, 0, 500, "+")],
        };
        let mut diag = MemoryDiagnostics::new();
        assert!(ev
            .reduce(&contig, &rafts, &AssemblyConfig::default(), &mut diag)
            .is_err());
    }

    #[test]
    fn test_collect_sorts_by_score() {
        let contig = small_contig();
        let rafts = singletons(&contig);
        let chain = |score| Evidence::FragmentChain {
            a: "AC1_1".to_string(),
            orientation: 1,
            b: "AC2_1".to_string(),
            min: 0,
            max: 100,
            score,
        };
        let mut diag = MemoryDiagnostics::new();
        let lines = collect_lines(
            &[chain(10), chain(30), chain(20)],
            &contig,
            &rafts,
            &AssemblyConfig::default(),
            &mut diag,
        )
        .unwrap();
        let scores: Vec<i32> = lines.iter().map(|l| l.score).collect();
        assert_eq!(scores, vec![30, 20, 10]);

        let mut line = lines[0].clone();
        line.reverse();
        assert_eq!(line.links[0].name, "AC2_1");
        assert_eq!(line.links[0].orientation, -1);
    }
}
