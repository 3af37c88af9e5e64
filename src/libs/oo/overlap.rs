use crate::libs::oo::config::AssemblyConfig;
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::model::{Contig, FragId, Phase};
use crate::libs::psl::Psl;

pub type EdgeId = usize;

/// A self alignment accepted as evidence that two fragments overlap.
///
/// `a` is the fragment whose aligned part starts further in, so `b` hangs off its right end
/// unless `a_covers`.
#[derive(Debug, Clone)]
pub struct OverlapEdge {
    pub a: FragId,
    pub b: FragId,
    /// Fragment on the query side of `psl`
    pub q: FragId,
    pub orientation: i8,
    pub match_count: i32,
    pub rep_match: i32,
    pub milli_bad: i32,
    pub start_tail: i32,
    pub end_tail: i32,
    pub score: i32,
    pub a_covers: bool,
    pub psl: Psl,
}

impl OverlapEdge {
    pub fn touches(&self, frag: FragId) -> bool {
        self.a == frag || self.b == frag
    }

    pub fn joins(&self, x: FragId, y: FragId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    pub fn other(&self, frag: FragId) -> FragId {
        if self.a == frag {
            self.b
        } else {
            self.a
        }
    }

    /// Aligned range on `frag`, forward strand coordinates.
    pub fn ali_range(&self, frag: FragId) -> (i32, i32) {
        if frag == self.q {
            (self.psl.q_start, self.psl.q_end)
        } else {
            (self.psl.t_start, self.psl.t_end)
        }
    }
}

fn encloses(psl: &Psl, slop: i32) -> bool {
    (psl.t_start <= slop && psl.t_end + slop >= psl.t_size as i32)
        || (psl.q_start <= slop && psl.q_end + slop >= psl.q_size as i32)
}

/// Scores one self alignment. `None` when either unaligned end is too long.
pub fn edge_from_self_psl(
    psl: &Psl,
    q: FragId,
    t: FragId,
    q_size: i32,
    t_size: i32,
    cfg: &AssemblyConfig,
) -> Option<OverlapEdge> {
    let sc = &cfg.scoring;
    let (q_floppy_start, q_floppy_end) = if psl.is_q_forward() {
        (psl.q_start, q_size - psl.q_end)
    } else {
        (q_size - psl.q_end, psl.q_start)
    };
    let q_floppy_start = q_floppy_start.max(0);
    let q_floppy_end = q_floppy_end.max(0);
    let t_floppy_start = psl.t_start.max(0);
    let t_floppy_end = (t_size - psl.t_end).max(0);

    let start_tail = q_floppy_start.min(t_floppy_start);
    let end_tail = q_floppy_end.min(t_floppy_end);
    if start_tail > cfg.max_tail_size || end_tail > cfg.max_tail_size {
        return None;
    }

    let orientation = if psl.is_q_forward() { 1 } else { -1 };
    let (a, b, a_covers) = if q_floppy_start >= t_floppy_start {
        (q, t, q_floppy_end >= t_floppy_end)
    } else {
        (t, q, t_floppy_end >= q_floppy_end)
    };

    let match_count = psl.match_count as i32;
    let rep_match = psl.rep_match as i32;
    let milli_bad = psl.milli_bad(false);
    let mut score = -sc.edge_milli_bad_weight * milli_bad - (start_tail + end_tail) / 2
        + (sc.match_log_weight * ((match_count + 1) as f64).ln() + ((rep_match + 1) as f64).ln())
            .round() as i32;

    if !encloses(psl, sc.enclose_slop) {
        if match_count <= sc.low_match_count {
            score -= (sc.low_match_count - match_count) * sc.low_match_penalty;
        }
        for size in [psl.q_size as i32, psl.t_size as i32] {
            if size < sc.small_frag_size {
                score -= (sc.small_frag_size - size) / sc.small_frag_divisor;
            }
        }
    }

    Some(OverlapEdge {
        a,
        b,
        q,
        orientation,
        match_count,
        rep_match,
        milli_bad,
        start_tail,
        end_tail,
        score,
        a_covers,
        psl: psl.clone(),
    })
}

/// Finished fragments always pass, others need the minimum size.
pub fn frag_passes(contig: &Contig, frag: FragId, cfg: &AssemblyConfig) -> bool {
    contig.frag_clone(frag).phase == Phase::Finished || contig.frags[frag].size >= cfg.min_frag_size
}

/// Overlap edges of every barge, each list sorted by descending score.
///
/// Returns the edges and, per barge, the ids of its edges.
pub fn barge_edges(
    contig: &Contig,
    psls: &[Psl],
    cfg: &AssemblyConfig,
) -> Result<(Vec<OverlapEdge>, Vec<Vec<EdgeId>>), AssemblyError> {
    let mut edges = vec![];
    let mut per_barge: Vec<Vec<EdgeId>> = vec![vec![]; contig.barges.len()];

    for psl in psls {
        let (q, t) = match (contig.resolve_frag(&psl.q_name)?, contig.resolve_frag(&psl.t_name)?) {
            (Some(q), Some(t)) => (q, t),
            _ => continue,
        };
        if q == t || !frag_passes(contig, q, cfg) || !frag_passes(contig, t, cfg) {
            continue;
        }
        let q_clone = contig.frags[q].clone;
        let t_clone = contig.frags[t].clone;
        let barge = match (contig.clones[q_clone].barge, contig.clones[t_clone].barge) {
            (Some(x), Some(y)) if x == y => x,
            _ => continue,
        };
        if !contig.clones_map_overlap(q_clone, t_clone) {
            continue;
        }

        let q_size = contig.frags[q].size;
        let t_size = contig.frags[t].size;
        if let Some(edge) = edge_from_self_psl(psl, q, t, q_size, t_size, cfg) {
            if edge.score >= cfg.min_score {
                per_barge[barge].push(edges.len());
                edges.push(edge);
            }
        }
    }

    for ids in per_barge.iter_mut() {
        ids.sort_by(|x, y| edges[*y].score.cmp(&edges[*x].score));
    }
    log::info!("{} overlap edges in {} barges", edges.len(), contig.barges.len());

    Ok((edges, per_barge))
}
