use crate::libs::oo::bridge::BridgeGraph;
use crate::libs::oo::config::AssemblyConfig;
use crate::libs::oo::diag::Diagnostics;
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::model::{Contig, FragId};
use crate::libs::oo::overlap::OverlapEdge;
use crate::libs::oo::raft::{Raft, RaftFrag, RaftId, RaftSet};
use fxhash::FxHashMap;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

/// Part of a fragment on the golden path. `start..end` is on the forward strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FragSpan {
    pub frag: FragId,
    pub start: i32,
    pub end: i32,
    pub orientation: i8,
}

impl FragSpan {
    fn whole(rf: &RaftFrag, contig: &Contig) -> Self {
        Self {
            frag: rf.frag,
            start: 0,
            end: contig.frags[rf.frag].size,
            orientation: rf.orientation,
        }
    }

    pub fn size(&self) -> i32 {
        self.end - self.start
    }

    pub fn is_reversal(&self) -> bool {
        self.end <= self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GapType {
    Fragment,
    Clone,
}

impl GapType {
    pub fn name(&self) -> &'static str {
        match self {
            GapType::Fragment => "fragment",
            GapType::Clone => "clone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Segment {
    Fragment(FragSpan),
    Gap {
        size: i32,
        gap_type: GapType,
        bridged: bool,
    },
}

impl Segment {
    pub fn size(&self) -> i32 {
        match self {
            Segment::Fragment(span) => span.size(),
            Segment::Gap { size, .. } => *size,
        }
    }
}

/// Path through one raft, placed at `start` on the contig.
#[derive(Debug, Clone, Serialize)]
pub struct RaftPath {
    pub raft: RaftId,
    pub segments: Vec<Segment>,
    pub start: i32,
    pub size: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GoldenPath {
    pub raft_paths: Vec<RaftPath>,
    pub segments: Vec<Segment>,
}

impl GoldenPath {
    pub fn size(&self) -> i32 {
        self.segments.iter().map(|s| s.size()).sum()
    }

    /// Bases of the path, uppercase, gaps as `N`.
    pub fn sequence(&self, contig: &Contig) -> Vec<u8> {
        let mut seq = Vec::with_capacity(self.size().max(0) as usize);
        for segment in &self.segments {
            match segment {
                Segment::Fragment(span) => {
                    let bases = &contig.frags[span.frag].seq;
                    let end = (span.end.max(0) as usize).min(bases.len());
                    let start = (span.start.max(0) as usize).min(end);
                    let piece = &bases[start..end];
                    if span.orientation < 0 {
                        seq.extend(bio::alphabets::dna::revcomp(piece));
                    } else {
                        seq.extend_from_slice(piece);
                    }
                }
                Segment::Gap { size, .. } => {
                    seq.extend(std::iter::repeat(b'N').take((*size).max(0) as usize));
                }
            }
        }
        seq.make_ascii_uppercase();
        seq
    }
}

/// Where to cut inside the shared alignment of two neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossAt {
    Usual,
    Middle,
    Extreme,
}

fn first_big_block(sizes: &[i32], big: i32) -> usize {
    sizes.iter().position(|&s| s >= big).unwrap_or(0)
}

fn last_big_block(sizes: &[i32], big: i32) -> usize {
    sizes
        .iter()
        .rposition(|&s| s >= big)
        .unwrap_or(sizes.len().saturating_sub(1))
}

fn mid_big_block(sizes: &[i32], big: i32) -> usize {
    let count = sizes.len();
    if count <= 1 {
        return 0;
    }
    let half = count / 2;
    for i in 0..=(count + 1) / 2 {
        if half + i < count && sizes[half + i] >= big {
            return half + i;
        }
        if i <= half && sizes[half - i] >= big {
            return half - i;
        }
    }
    half
}

/// Alignment blocks of an edge as seen from `a` in orientation `a_orientation`.
struct AlignedBlocks {
    sizes: Vec<i32>,
    a_starts: Vec<i32>,
    b_starts: Vec<i32>,
    b_orientation: i8,
}

fn oriented_blocks(edge: &OverlapEdge, a: FragId, a_orientation: i8, a_size: i32, b_size: i32) -> AlignedBlocks {
    let psl = &edge.psl;
    let a_is_q = edge.q == a;
    let (a_src, b_src) = if a_is_q {
        (&psl.q_starts, &psl.t_starts)
    } else {
        (&psl.t_starts, &psl.q_starts)
    };
    let reverse = if a_is_q {
        a_orientation * edge.orientation < 0
    } else {
        a_orientation < 0
    };

    let n = psl.block_sizes.len().min(a_src.len()).min(b_src.len());
    let mut blocks = AlignedBlocks {
        sizes: Vec::with_capacity(n),
        a_starts: Vec::with_capacity(n),
        b_starts: Vec::with_capacity(n),
        b_orientation: a_orientation * edge.orientation,
    };
    for i in 0..n {
        let ix = if reverse { n - 1 - i } else { i };
        let size = psl.block_sizes[ix] as i32;
        let (sa, sb) = (a_src[ix] as i32, b_src[ix] as i32);
        blocks.sizes.push(size);
        if reverse {
            blocks.a_starts.push(a_size - (sa + size));
            blocks.b_starts.push(b_size - (sb + size));
        } else {
            blocks.a_starts.push(sa);
            blocks.b_starts.push(sb);
        }
    }
    blocks
}

/// Cuts `a` inside its alignment with `b` and returns the part of `b` that follows.
///
/// The better fragment gives the larger share unless `cross_at` says otherwise.
pub fn find_crossover(
    edge: &OverlapEdge,
    a: &mut FragSpan,
    b: FragId,
    contig: &Contig,
    cfg: &AssemblyConfig,
    cross_at: CrossAt,
) -> Option<FragSpan> {
    let sc = &cfg.scoring;
    let a_size = contig.frags[a.frag].size;
    let b_size = contig.frags[b].size;
    let blocks = oriented_blocks(edge, a.frag, a.orientation, a_size, b_size);
    if blocks.sizes.is_empty() {
        return None;
    }

    let big = sc.big_block as i32;
    let margin = sc.cross_margin as i32;
    let mut more_from_a = contig.seq_quality(a.frag, sc) > contig.seq_quality(b, sc);
    if cross_at == CrossAt::Extreme {
        more_from_a = !more_from_a;
    }
    let ix = match cross_at {
        CrossAt::Middle => mid_big_block(&blocks.sizes, big),
        _ if more_from_a => last_big_block(&blocks.sizes, big),
        _ => first_big_block(&blocks.sizes, big),
    };

    let size = blocks.sizes[ix];
    let mut point = size / 2;
    if cross_at != CrossAt::Middle {
        if point > margin {
            point = size - margin;
        }
        if !more_from_a {
            point = size - point;
        }
    }

    let a_cross = blocks.a_starts[ix] + point;
    if a.orientation > 0 {
        a.end = a_cross;
    } else {
        a.start = a_size - a_cross;
    }
    let b_cross = blocks.b_starts[ix] + point;
    let (start, end) = if blocks.b_orientation > 0 {
        (b_cross, b_size)
    } else {
        (0, b_size - b_cross)
    };
    Some(FragSpan {
        frag: b,
        start,
        end,
        orientation: blocks.b_orientation,
    })
}

fn best_edge<'a>(raft: &Raft, edges: &'a [OverlapEdge], a: FragId, b: FragId) -> Option<&'a OverlapEdge> {
    let mut best: Option<&OverlapEdge> = None;
    for &e in &raft.edge_refs {
        let edge = &edges[e];
        if edge.joins(a, b) && best.map_or(true, |x| edge.score > x.score) {
            best = Some(edge);
        }
    }
    best
}

/// Highest quality fragment at each raft base, runs collapsed, enclosed fragments dropped.
fn best_frag_refs(contig: &Contig, raft: &Raft, cfg: &AssemblyConfig) -> Vec<RaftFrag> {
    let size = raft.end.max(0) as usize;
    let mut best: Vec<Option<usize>> = vec![None; size];
    let mut score = vec![0; size];
    for (i, rf) in raft.frags.iter().enumerate() {
        let quality = contig.seq_quality(rf.frag, &cfg.scoring);
        let start = rf.offset.max(0) as usize;
        let end = ((rf.offset + contig.frags[rf.frag].size).max(0) as usize).min(size);
        for pos in start..end {
            if score[pos] < quality {
                score[pos] = quality;
                best[pos] = Some(i);
            }
        }
    }

    let mut runs: Vec<usize> = vec![];
    for &i in best.iter().flatten() {
        if runs.last() != Some(&i) {
            runs.push(i);
        }
    }

    let mut refs = vec![];
    let mut i = 0;
    while i < runs.len() {
        let last = runs.iter().rposition(|&r| r == runs[i]).unwrap_or(i);
        refs.push(raft.frags[runs[last]]);
        i = last + 1;
    }
    refs
}

/// Stitches consecutive fragments through their best edge. `None` when a pair has no edge.
fn path_through_refs(
    refs: &[RaftFrag],
    cross: &[CrossAt],
    raft: &Raft,
    edges: &[OverlapEdge],
    contig: &Contig,
    cfg: &AssemblyConfig,
) -> Option<Vec<FragSpan>> {
    let first = refs.first()?;
    let mut spans = vec![FragSpan::whole(first, contig)];
    for (i, rf) in refs.iter().enumerate().skip(1) {
        let last = spans.last_mut()?;
        let edge = best_edge(raft, edges, last.frag, rf.frag)?;
        let next = find_crossover(edge, last, rf.frag, contig, cfg, cross[i])?;
        spans.push(next);
    }
    Some(spans)
}

fn has_reversal(spans: &[FragSpan]) -> bool {
    spans.iter().any(|s| s.is_reversal())
}

/// Retries the crossovers next to each reversal, middle cuts first, then extreme ones.
fn fix_reversals(
    refs: &[RaftFrag],
    first: Vec<FragSpan>,
    raft: &Raft,
    edges: &[OverlapEdge],
    contig: &Contig,
    cfg: &AssemblyConfig,
) -> Vec<FragSpan> {
    let mut latest = first;
    for cross_at in [CrossAt::Middle, CrossAt::Extreme] {
        for (left, right) in [(true, false), (false, true), (true, true)] {
            let mut cross = vec![CrossAt::Usual; refs.len()];
            for (i, span) in latest.iter().enumerate() {
                if span.is_reversal() {
                    if left {
                        cross[i] = cross_at;
                    }
                    if right && i + 1 < cross.len() {
                        cross[i + 1] = cross_at;
                    }
                }
            }
            if let Some(spans) = path_through_refs(refs, &cross, raft, edges, contig, cfg) {
                let fixed = !has_reversal(&spans);
                latest = spans;
                if fixed {
                    return latest;
                }
            }
        }
        log::debug!("raft {}: {:?} cuts left reversals", raft.id, cross_at);
    }
    latest
}

/// Any route from the leftmost fragment to the one reaching furthest right.
fn hard_path_refs(raft: &Raft, edges: &[OverlapEdge], contig: &Contig) -> Option<Vec<RaftFrag>> {
    let mut graph: UnGraph<usize, ()> = UnGraph::new_undirected();
    let mut node_of: FxHashMap<FragId, NodeIndex> = FxHashMap::default();
    let mut start: Option<(i32, NodeIndex)> = None;
    let mut end: Option<(i32, NodeIndex)> = None;
    for (i, rf) in raft.frags.iter().enumerate() {
        let node = graph.add_node(i);
        node_of.insert(rf.frag, node);
        let s = rf.offset;
        let e = s + contig.frags[rf.frag].size;
        if start.map_or(true, |(x, _)| s < x) {
            start = Some((s, node));
        }
        if end.map_or(true, |(x, _)| e > x) {
            end = Some((e, node));
        }
    }
    for &e in &raft.edge_refs {
        if let (Some(&a), Some(&b)) = (node_of.get(&edges[e].a), node_of.get(&edges[e].b)) {
            graph.add_edge(a, b, ());
        }
    }

    let (_, goal) = end?;
    let (_, path) = astar(&graph, start?.1, |n| n == goal, |_| 1, |_| 0)?;
    Some(path.into_iter().map(|n| raft.frags[graph[n]]).collect())
}

fn remove_reversals(spans: Vec<FragSpan>, raft: &Raft, contig: &Contig, diag: &mut dyn Diagnostics) -> Vec<FragSpan> {
    spans
        .into_iter()
        .filter(|span| {
            if span.is_reversal() {
                diag.record_degraded(&format!(
                    "reversal still in raft {} path at {} {}-{}, removed",
                    raft.id, contig.frags[span.frag].name, span.start, span.end
                ));
                false
            } else {
                true
            }
        })
        .collect()
}

/// Best stitched path through a raft, turning it forward first if it is reversed.
pub fn path_through_raft(
    contig: &Contig,
    rafts: &mut RaftSet,
    raft: RaftId,
    cfg: &AssemblyConfig,
    diag: &mut dyn Diagnostics,
) -> Result<Vec<FragSpan>, AssemblyError> {
    if rafts.rafts[raft].orientation < 0 {
        rafts.rafts[raft].flip_frags(contig);
        rafts.rafts[raft].orientation = 1;
    }
    let set: &RaftSet = rafts;
    let r = &set.rafts[raft];
    let no_path = || AssemblyError::Internal(format!("no path through raft {}", r.id));

    let refs = best_frag_refs(contig, r, cfg);
    if refs.is_empty() {
        return Err(no_path());
    }
    let usual = vec![CrossAt::Usual; refs.len()];
    let spans = match path_through_refs(&refs, &usual, r, &set.edges, contig, cfg) {
        Some(spans) if has_reversal(&spans) => fix_reversals(&refs, spans, r, &set.edges, contig, cfg),
        Some(spans) => spans,
        None => {
            log::debug!("taking the hard path through raft {}", r.id);
            let hard = hard_path_refs(r, &set.edges, contig).ok_or_else(no_path)?;
            let usual = vec![CrossAt::Usual; hard.len()];
            let spans = path_through_refs(&hard, &usual, r, &set.edges, contig, cfg).ok_or_else(no_path)?;
            if has_reversal(&spans) {
                fix_reversals(&hard, spans, r, &set.edges, contig, cfg)
            } else {
                spans
            }
        }
    };
    Ok(remove_reversals(spans, r, contig, diag))
}

/// Gap between two consecutive rafts on the golden path.
pub fn gap_between(
    a: RaftId,
    b: RaftId,
    rafts: &RaftSet,
    bridges: &BridgeGraph,
    components: &[usize],
    cfg: &AssemblyConfig,
) -> Segment {
    let (x, y) = (&rafts.rafts[a], &rafts.rafts[b]);
    if x.barge == y.barge {
        let component = |r| bridges.raft_node(r).map(|n| components[n.index()]);
        Segment::Gap {
            size: cfg.frag_gap,
            gap_type: GapType::Fragment,
            bridged: component(a).is_some() && component(a) == component(b),
        }
    } else {
        let bridged = match (x.barge, y.barge) {
            (Some(p), Some(q)) => bridges.barges_bridged(p, q),
            _ => false,
        };
        Segment::Gap {
            size: if bridged {
                cfg.bridged_barge_gap
            } else {
                cfg.unbridged_barge_gap
            },
            gap_type: GapType::Clone,
            bridged,
        }
    }
}

/// Paths through every raft in `order`, joined by gaps.
pub fn assemble(
    order: &[RaftId],
    contig: &Contig,
    rafts: &mut RaftSet,
    bridges: &BridgeGraph,
    cfg: &AssemblyConfig,
    diag: &mut dyn Diagnostics,
) -> Result<GoldenPath, AssemblyError> {
    let components = bridges.graph.component_numbers();
    let mut golden = GoldenPath::default();
    let mut pos = 0;
    for (i, &raft) in order.iter().enumerate() {
        let spans = path_through_raft(contig, rafts, raft, cfg, diag)?;
        let segments: Vec<Segment> = spans.into_iter().map(Segment::Fragment).collect();
        let size = segments.iter().map(|s| s.size()).sum();
        golden.segments.extend_from_slice(&segments);
        golden.raft_paths.push(RaftPath {
            raft,
            segments,
            start: pos,
            size,
        });
        pos += size;

        if let Some(&next) = order.get(i + 1) {
            let gap = gap_between(raft, next, rafts, bridges, &components, cfg);
            pos += gap.size();
            golden.segments.push(gap);
        }
    }
    log::info!(
        "golden path of {} rafts, {} bases",
        golden.raft_paths.len(),
        golden.size()
    );
    Ok(golden)
}
