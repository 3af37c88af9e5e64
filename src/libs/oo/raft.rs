use crate::libs::oo::config::AssemblyConfig;
use crate::libs::oo::diag::{Diagnostics, Rejection};
use crate::libs::oo::model::{BargeId, Contig, FragId};
use crate::libs::oo::overlap::{EdgeId, OverlapEdge};
use fxhash::FxHashMap;
use std::collections::VecDeque;

pub type RaftId = usize;

/// Placement of one fragment inside a raft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaftFrag {
    pub frag: FragId,
    pub offset: i32,
    pub orientation: i8,
}

/// Fragments locked together by overlaps.
#[derive(Debug, Clone)]
pub struct Raft {
    /// 1-based display id
    pub id: usize,
    pub frags: Vec<RaftFrag>,
    pub start: i32,
    pub end: i32,
    /// Overlap edges supporting the layout
    pub edge_refs: Vec<EdgeId>,
    /// Orientation in the raft graph, 0 until something decides it
    pub orientation: i8,
    pub default_pos: i32,
    pub flip_tendency: i32,
    pub barge: Option<BargeId>,
    /// Raft that absorbed this one
    pub parent: Option<RaftId>,
}

/// Maps `[s, e)` of a fragment of `size` bases into raft coordinates.
pub fn frag_range_to_raft_range(s: i32, e: i32, size: i32, orientation: i8, offset: i32) -> (i32, i32) {
    if orientation > 0 {
        (offset + s, offset + e)
    } else {
        (size - e + offset, size - s + offset)
    }
}

impl Raft {
    fn new(id: usize, frags: Vec<RaftFrag>, barge: Option<BargeId>) -> Self {
        Self {
            id,
            frags,
            start: 0,
            end: 0,
            edge_refs: vec![],
            orientation: 0,
            default_pos: 0,
            flip_tendency: 0,
            barge,
            parent: None,
        }
    }

    pub fn size(&self) -> i32 {
        self.end - self.start
    }

    pub fn is_live(&self) -> bool {
        self.parent.is_none()
    }

    pub fn find(&self, frag: FragId) -> Option<RaftFrag> {
        self.frags.iter().find(|rf| rf.frag == frag).copied()
    }

    /// Shifts offsets so the raft runs from 0 to its length.
    ///
    /// ```
    /// use oog::libs::oo::raft::{Raft, RaftFrag};
    /// use oog::libs::oo::model::{Contig, Phase};
    /// let mut contig = Contig::new("ctg");
    /// let c = contig.add_clone("AC1", 0, Phase::Draft, 0).unwrap();
    /// contig.add_fragment(c, "AC1_1", vec![b'A'; 100]).unwrap();
    /// contig.add_fragment(c, "AC1_2", vec![b'A'; 100]).unwrap();
    ///
    /// let mut raft = Raft::with_frags(1, vec![
    ///     RaftFrag { frag: 0, offset: -40, orientation: 1 },
    ///     RaftFrag { frag: 1, offset: 20, orientation: -1 },
    /// ]);
    /// raft.normalize(&contig);
    /// assert_eq!((raft.start, raft.end), (0, 160));
    /// assert_eq!(raft.frags[1].offset, 60);
    ///
    /// raft.normalize(&contig);
    /// assert_eq!(raft.frags[0].offset, 0);
    /// assert_eq!(raft.end, 160);
    /// ```
    pub fn normalize(&mut self, contig: &Contig) {
        let s_min = self.frags.iter().map(|rf| rf.offset).min().unwrap_or(0);
        let e_max = self
            .frags
            .iter()
            .map(|rf| rf.offset + contig.frags[rf.frag].size)
            .max()
            .unwrap_or(0);
        self.start = 0;
        self.end = e_max - s_min;
        for rf in self.frags.iter_mut() {
            rf.offset -= s_min;
        }
    }

    /// A raft that does not belong to a set, for layouts built by hand.
    pub fn with_frags(id: usize, frags: Vec<RaftFrag>) -> Self {
        Self::new(id, frags, None)
    }

    /// Reverses the internal layout.
    pub fn flip_frags(&mut self, contig: &Contig) {
        let end = self.end;
        for rf in self.frags.iter_mut() {
            rf.orientation = -rf.orientation;
            rf.offset = end - (rf.offset + contig.frags[rf.frag].size);
        }
        self.end = end - self.start;
        self.start = 0;
        self.frags.reverse();
    }

    /// Alignment range of `edge` on the member `rf`, in raft coordinates.
    pub fn ali_range(rf: &RaftFrag, edge: &OverlapEdge, contig: &Contig) -> (i32, i32) {
        let (s, e) = edge.ali_range(rf.frag);
        frag_range_to_raft_range(s, e, contig.frags[rf.frag].size, rf.orientation, rf.offset)
    }
}

/// All rafts of a contig plus the overlap edges they reference.
#[derive(Debug, Clone, Default)]
pub struct RaftSet {
    pub rafts: Vec<Raft>,
    pub edges: Vec<OverlapEdge>,
    frag_raft: Vec<Option<RaftId>>,
}

struct Worklist {
    todo: VecDeque<EdgeId>,
    used: Vec<bool>,
    requeued: FxHashMap<EdgeId, usize>,
}

impl RaftSet {
    pub fn new(frag_count: usize, edges: Vec<OverlapEdge>) -> Self {
        Self {
            rafts: vec![],
            edges,
            frag_raft: vec![None; frag_count],
        }
    }

    pub fn raft_of(&self, frag: FragId) -> Option<RaftId> {
        self.frag_raft.get(frag).copied().flatten()
    }

    pub fn raft_frag(&self, frag: FragId) -> Option<(RaftId, RaftFrag)> {
        let r = self.raft_of(frag)?;
        self.rafts[r].find(frag).map(|rf| (r, rf))
    }

    /// Surviving rafts in creation order.
    pub fn live(&self) -> Vec<RaftId> {
        (0..self.rafts.len())
            .filter(|&r| self.rafts[r].is_live())
            .collect()
    }

    pub fn ancestor(&self, mut raft: RaftId) -> RaftId {
        while let Some(p) = self.rafts[raft].parent {
            raft = p;
        }
        raft
    }

    fn push_raft(&mut self, frags: Vec<RaftFrag>, barge: Option<BargeId>, contig: &Contig) -> RaftId {
        let r = self.rafts.len();
        let mut raft = Raft::new(r + 1, frags, barge);
        raft.normalize(contig);
        for rf in &raft.frags {
            self.frag_raft[rf.frag] = Some(r);
        }
        self.rafts.push(raft);
        r
    }

    fn frag_name<'a>(&self, contig: &'a Contig, frag: FragId) -> &'a str {
        &contig.frags[frag].name
    }

    fn edge_label(&self, contig: &Contig, e: EdgeId) -> String {
        let edge = &self.edges[e];
        format!(
            "{} {} {} score {}",
            self.frag_name(contig, edge.a),
            if edge.orientation > 0 { "->" } else { "~>" },
            self.frag_name(contig, edge.b),
            edge.score
        )
    }

    fn raft_of_two(&mut self, contig: &Contig, e: EdgeId, barge: BargeId) -> RaftId {
        let edge = &self.edges[e];
        let (a_start, _) = edge.ali_range(edge.a);
        let (b_start, b_end) = edge.ali_range(edge.b);
        let b_offset = if edge.orientation > 0 {
            a_start - b_start
        } else {
            a_start - (contig.frags[edge.b].size - b_end)
        };
        let frags = vec![
            RaftFrag {
                frag: edge.a,
                offset: 0,
                orientation: 1,
            },
            RaftFrag {
                frag: edge.b,
                offset: b_offset,
                orientation: edge.orientation,
            },
        ];
        self.push_raft(frags, Some(barge), contig)
    }

    /// Does `frag`, placed at `offset`, align to the raft members it would lie over?
    ///
    /// Only the interior of the fragment and of the raft is checked.
    #[allow(clippy::too_many_arguments)]
    fn frag_mostly_aligns(
        &self,
        contig: &Contig,
        frag: FragId,
        offset: i32,
        orientation: i8,
        raft: RaftId,
        edge_ids: &[EdgeId],
        cfg: &AssemblyConfig,
    ) -> bool {
        let size = contig.frags[frag].size;
        let tail = cfg.max_tail_size;
        let r = &self.rafts[raft];
        let (s, e) = frag_range_to_raft_range(tail, size - tail, size, orientation, offset);
        let check_start = s.max(r.start + tail);
        let check_end = e.min(r.end - tail);
        let check_size = check_end - check_start;
        if check_size <= 0 {
            return true;
        }

        let mut covered = vec![false; check_size as usize];
        for rf in &r.frags {
            for &id in edge_ids {
                let edge = &self.edges[id];
                if orientation * rf.orientation != edge.orientation || !edge.joins(frag, rf.frag) {
                    continue;
                }
                let (xs, xe) = Raft::ali_range(rf, edge, contig);
                let xs = xs.max(check_start);
                let xe = xe.min(check_end);
                if xe - xs >= check_size {
                    return true;
                }
                if xe > xs {
                    covered[(xs - check_start) as usize..(xe - check_start) as usize].fill(true);
                }
            }
        }

        covered.iter().filter(|c| !**c).count() < cfg.scoring.extend_slack
    }

    /// Adds `frag` to `raft` next to `socket` as placed by edge `e`.
    #[allow(clippy::too_many_arguments)]
    fn extend_raft(
        &mut self,
        contig: &Contig,
        raft: RaftId,
        socket: FragId,
        e: EdgeId,
        frag: FragId,
        edge_ids: &[EdgeId],
        cfg: &AssemblyConfig,
    ) -> bool {
        let Some(socket) = self.rafts[raft].find(socket) else {
            return false;
        };
        let edge = &self.edges[e];
        let orientation = socket.orientation * edge.orientation;
        let (raft_start, _) = Raft::ali_range(&socket, edge, contig);
        let (frag_start, frag_end) = edge.ali_range(frag);
        let size = contig.frags[frag].size;
        let offset = if orientation > 0 {
            raft_start - frag_start
        } else {
            raft_start - (size - frag_end)
        };

        if !self.frag_mostly_aligns(contig, frag, offset, orientation, raft, edge_ids, cfg) {
            return false;
        }

        let r = &mut self.rafts[raft];
        r.frags.push(RaftFrag {
            frag,
            offset,
            orientation,
        });
        r.start = r.start.min(offset);
        r.end = r.end.max(offset + size);
        r.normalize(contig);
        self.frag_raft[frag] = Some(raft);
        true
    }

    /// Checks one overhang window of raft `a` against raft `b` along the merge diagonal.
    #[allow(clippy::too_many_arguments)]
    fn b_mostly_aligns_with_a(
        &self,
        contig: &Contig,
        a: RaftId,
        a_start: i32,
        a_end: i32,
        b: RaftId,
        rel: i8,
        diag: i32,
        edge_ids: &[EdgeId],
        cfg: &AssemblyConfig,
    ) -> bool {
        let check_size = a_end - a_start;
        if check_size <= cfg.max_tail_size {
            return true;
        }

        let mut covered = vec![false; check_size as usize];
        for &id in edge_ids {
            let edge = &self.edges[id];
            let (fa, fb) = if self.raft_of(edge.a) == Some(a) && self.raft_of(edge.b) == Some(b) {
                (edge.a, edge.b)
            } else if self.raft_of(edge.b) == Some(a) && self.raft_of(edge.a) == Some(b) {
                (edge.b, edge.a)
            } else {
                continue;
            };
            let (Some(a_rf), Some(b_rf)) = (self.rafts[a].find(fa), self.rafts[b].find(fb)) else {
                continue;
            };
            let (xs, xe) = Raft::ali_range(&a_rf, edge, contig);
            let (ys, ye) = Raft::ali_range(&b_rf, edge, contig);
            let line_diag = if rel > 0 {
                xs - ys
            } else {
                xs - (self.rafts[b].end - ye)
            };
            if (line_diag - diag).abs() >= cfg.scoring.merge_diag_slop {
                continue;
            }
            let s = (xs - a_start).max(0);
            let e = (xe - a_start).min(check_size);
            if e - s == check_size {
                return true;
            }
            if e > s {
                covered[s as usize..e as usize].fill(true);
            }
        }

        covered.iter().filter(|c| !**c).count() < cfg.scoring.merge_slack
    }

    /// Moves all of raft `y` into raft `x` so the two alignment ranges coincide.
    #[allow(clippy::too_many_arguments)]
    fn swallow(
        &mut self,
        contig: &Contig,
        x: RaftId,
        y: RaftId,
        x_ali_start: i32,
        y_ali: (i32, i32),
        rel: i8,
    ) {
        let y_start = if rel < 0 {
            let end = self.rafts[y].end;
            self.rafts[y].flip_frags(contig);
            end - y_ali.1
        } else {
            y_ali.0
        };

        let offset = x_ali_start - y_start;
        let mut frags = std::mem::take(&mut self.rafts[y].frags);
        let mut refs = std::mem::take(&mut self.rafts[y].edge_refs);
        for rf in frags.iter_mut() {
            rf.offset += offset;
            self.frag_raft[rf.frag] = Some(x);
        }
        let (ys, ye) = (self.rafts[y].start + offset, self.rafts[y].end + offset);
        self.rafts[y].parent = Some(x);

        let r = &mut self.rafts[x];
        r.start = r.start.min(ys);
        r.end = r.end.max(ye);
        r.frags.append(&mut frags);
        r.edge_refs.append(&mut refs);
        r.normalize(contig);
    }

    /// Merges the rafts joined by edge `e`. Returns the surviving raft.
    #[allow(clippy::too_many_arguments)]
    fn merge_rafts(
        &mut self,
        contig: &Contig,
        ra: RaftId,
        rb: RaftId,
        e: EdgeId,
        edge_ids: &[EdgeId],
        cfg: &AssemblyConfig,
    ) -> Option<RaftId> {
        let edge = &self.edges[e];
        let a_rf = self.rafts[ra].find(edge.a)?;
        let b_rf = self.rafts[rb].find(edge.b)?;
        let rel = edge.orientation * a_rf.orientation * b_rf.orientation;
        let (a_s, a_e) = Raft::ali_range(&a_rf, edge, contig);
        let (b_s, b_e) = Raft::ali_range(&b_rf, edge, contig);
        let (a_raft, b_raft) = (&self.rafts[ra], &self.rafts[rb]);

        let (start_tail, end_tail) = if rel > 0 {
            (
                (a_s - a_raft.start).min(b_s - b_raft.start),
                (a_raft.end - a_e).min(b_raft.end - b_e),
            )
        } else {
            (
                (a_s - a_raft.start).min(b_raft.end - b_e),
                (a_raft.end - a_e).min(b_s - b_raft.start),
            )
        };

        if start_tail > cfg.max_tail_size || end_tail > cfg.max_tail_size {
            let ok = if rel > 0 {
                let diag = a_s - b_s;
                self.b_mostly_aligns_with_a(contig, ra, a_s - start_tail, a_s, rb, rel, diag, edge_ids, cfg)
                    && self.b_mostly_aligns_with_a(contig, ra, a_e, a_e + end_tail, rb, rel, diag, edge_ids, cfg)
            } else {
                let diag = a_s - (b_raft.end - b_e);
                self.b_mostly_aligns_with_a(contig, ra, a_s - start_tail, a_s, rb, rel, diag, edge_ids, cfg)
                    && self.b_mostly_aligns_with_a(contig, ra, a_e, a_e + end_tail, rb, rel, diag, edge_ids, cfg)
            };
            if !ok {
                return None;
            }
        }

        // the larger raft keeps its layout
        if self.rafts[rb].size() > self.rafts[ra].size() {
            self.swallow(contig, rb, ra, b_s, (a_s, a_e), rel);
            Some(rb)
        } else {
            self.swallow(contig, ra, rb, a_s, (b_s, b_e), rel);
            Some(ra)
        }
    }

    /// Looks for an unused edge that would put `frag` into a longer raft than `orig_raft`.
    fn find_best_raft_edge(
        &self,
        frag: FragId,
        orig_raft: RaftId,
        orig_edge: EdgeId,
        work: &Worklist,
        cfg: &AssemblyConfig,
    ) -> Option<usize> {
        let threshold = (self.edges[orig_edge].score - cfg.scoring.better_edge_window).max(cfg.min_score);
        let mut longest = self.rafts[orig_raft].size();
        let mut best = None;
        for (pos, &id) in work.todo.iter().enumerate() {
            let edge = &self.edges[id];
            if edge.score < threshold || work.used[id] || !edge.touches(frag) {
                continue;
            }
            if let Some(r) = self.raft_of(edge.other(frag)) {
                let size = self.rafts[r].size();
                if size > longest {
                    longest = size;
                    best = Some(pos);
                }
            }
        }
        best
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_best_raft_edge(
        &mut self,
        contig: &Contig,
        frag: FragId,
        orig_raft: RaftId,
        orig_edge: EdgeId,
        work: &mut Worklist,
        edge_ids: &[EdgeId],
        cfg: &AssemblyConfig,
        diag: &mut dyn Diagnostics,
    ) {
        let mut chosen = orig_edge;
        let count = work.requeued.get(&orig_edge).copied().unwrap_or(0);
        if count < cfg.max_requeue {
            if let Some(pos) = self.find_best_raft_edge(frag, orig_raft, orig_edge, work, cfg) {
                if let Some(better) = work.todo.remove(pos) {
                    chosen = better;
                    work.todo.push_front(orig_edge);
                    work.requeued.insert(orig_edge, count + 1);
                }
            }
        }

        work.used[chosen] = true;
        let socket = self.edges[chosen].other(frag);
        let Some(raft) = self.raft_of(socket) else {
            return;
        };
        if self.extend_raft(contig, raft, socket, chosen, frag, edge_ids, cfg) {
            self.rafts[raft].edge_refs.push(chosen);
            diag.record_accept(&format!(
                "{} extends raft {}",
                self.edge_label(contig, chosen),
                self.rafts[raft].id
            ));
        } else {
            diag.record_rejection(
                Rejection::FailedExtension,
                &format!("{}: can't extend raft {}", self.edge_label(contig, chosen), self.rafts[raft].id),
            );
        }
    }

    /// Greedy raft building over the score-sorted edges of one barge.
    pub fn make_rafts(
        &mut self,
        contig: &Contig,
        barge: BargeId,
        edge_ids: &[EdgeId],
        cfg: &AssemblyConfig,
        diag: &mut dyn Diagnostics,
    ) {
        let mut work = Worklist {
            todo: edge_ids.iter().copied().collect(),
            used: vec![false; self.edges.len()],
            requeued: FxHashMap::default(),
        };
        let mut failures: Vec<(EdgeId, RaftId, RaftId)> = vec![];

        while let Some(e) = work.todo.pop_front() {
            let (a, b) = (self.edges[e].a, self.edges[e].b);
            match (self.raft_of(a), self.raft_of(b)) {
                (None, None) => {
                    let r = self.raft_of_two(contig, e, barge);
                    self.rafts[r].edge_refs.push(e);
                    diag.record_accept(&format!(
                        "{} starts raft {}",
                        self.edge_label(contig, e),
                        self.rafts[r].id
                    ));
                }
                (Some(ra), Some(rb)) if ra == rb => {
                    let (Some(a_rf), Some(b_rf)) = (self.rafts[ra].find(a), self.rafts[ra].find(b)) else {
                        continue;
                    };
                    if a_rf.orientation * b_rf.orientation == self.edges[e].orientation {
                        self.rafts[ra].edge_refs.push(e);
                        diag.record_accept(&format!(
                            "{} redundant in raft {}",
                            self.edge_label(contig, e),
                            self.rafts[ra].id
                        ));
                    } else {
                        diag.record_rejection(
                            Rejection::ConflictingEdge,
                            &format!("{}: bad orientation in redundant edge", self.edge_label(contig, e)),
                        );
                    }
                }
                (Some(ra), Some(rb)) => match self.merge_rafts(contig, ra, rb, e, edge_ids, cfg) {
                    Some(keep) => {
                        self.rafts[keep].edge_refs.push(e);
                        let gone = if keep == ra { rb } else { ra };
                        diag.record_merge(&format!(
                            "{}: raft {} into raft {}",
                            self.edge_label(contig, e),
                            self.rafts[gone].id,
                            self.rafts[keep].id
                        ));
                    }
                    None => {
                        failures.push((e, ra, rb));
                        diag.record_rejection(
                            Rejection::DeferredMerge,
                            &format!(
                                "{}: rafts {} and {} disagree past the overlap",
                                self.edge_label(contig, e),
                                self.rafts[ra].id,
                                self.rafts[rb].id
                            ),
                        );
                    }
                },
                (Some(ra), None) => {
                    self.merge_best_raft_edge(contig, b, ra, e, &mut work, edge_ids, cfg, diag);
                }
                (None, Some(rb)) => {
                    self.merge_best_raft_edge(contig, a, rb, e, &mut work, edge_ids, cfg, diag);
                }
            }
        }

        for (e, ra, rb) in failures {
            let parent = self.ancestor(ra);
            if parent == self.ancestor(rb) {
                self.rafts[parent].edge_refs.push(e);
                diag.record_accept(&format!(
                    "{} merges ok after all in raft {}",
                    self.edge_label(contig, e),
                    self.rafts[parent].id
                ));
            }
        }
    }

    /// Every fragment not yet placed becomes a raft of its own.
    pub fn make_singletons(&mut self, contig: &Contig) {
        for frag in 0..contig.frags.len() {
            if self.raft_of(frag).is_none() {
                let rf = RaftFrag {
                    frag,
                    offset: 0,
                    orientation: 1,
                };
                self.push_raft(vec![rf], contig.frag_barge(frag), contig);
            }
        }
    }

    pub fn sort_frags(&mut self) {
        for raft in self.rafts.iter_mut() {
            raft.frags.sort_by_key(|rf| rf.offset);
        }
    }
}

/// Builds the rafts of every barge, then singletons for the rest.
pub fn build_rafts(
    contig: &Contig,
    edges: Vec<OverlapEdge>,
    per_barge: &[Vec<EdgeId>],
    cfg: &AssemblyConfig,
    diag: &mut dyn Diagnostics,
) -> RaftSet {
    let mut set = RaftSet::new(contig.frags.len(), edges);
    for (barge, ids) in per_barge.iter().enumerate() {
        set.make_rafts(contig, barge, ids, cfg, diag);
    }
    let multi = set.live().len();
    set.make_singletons(contig);
    set.sort_frags();
    log::info!(
        "{} rafts, {} from overlaps and {} singletons",
        set.live().len(),
        multi,
        set.live().len() - multi
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::oo::diag::MemoryDiagnostics;
    use crate::libs::oo::model::{CloneEnd, Phase};
    use crate::libs::oo::overlap::barge_edges;
    use crate::libs::psl::Psl;

    /// One barge holding one clone per fragment size, all overlapping on the map.
    fn contig_of(sizes: &[i32]) -> Contig {
        let mut contig = Contig::new("ctg");
        let mut ends = vec![];
        for (i, &size) in sizes.iter().enumerate() {
            let c = contig
                .add_clone(&format!("AC{}", i + 1), 0, Phase::Draft, 0)
                .unwrap();
            contig
                .add_fragment(c, &format!("AC{}_1", i + 1), vec![b'A'; size as usize])
                .unwrap();
            ends.push(CloneEnd::Start {
                clone: c,
                orientation: 1,
            });
        }
        for c in 0..sizes.len() {
            ends.push(CloneEnd::End { clone: c });
        }
        contig.add_barge(ends).unwrap();
        contig
    }

    fn rafts_for(contig: &Contig, psls: &[Psl]) -> (RaftSet, MemoryDiagnostics) {
        rafts_with(contig, psls, &AssemblyConfig::default())
    }

    fn rafts_with(contig: &Contig, psls: &[Psl], cfg: &AssemblyConfig) -> (RaftSet, MemoryDiagnostics) {
        let mut diag = MemoryDiagnostics::new();
        let (edges, per_barge) = barge_edges(contig, psls, cfg).unwrap();
        let set = build_rafts(contig, edges, &per_barge, cfg, &mut diag);
        (set, diag)
    }

    /// Turns `n` matches of an alignment into mismatches, lowering its score.
    fn noisy(mut psl: Psl, n: u32) -> Psl {
        psl.match_count -= n;
        psl.mismatch_count = n;
        psl
    }

    fn details<'a>(diag: &'a MemoryDiagnostics, tag: &str) -> Vec<&'a str> {
        diag.events
            .iter()
            .filter(|(t, _)| t == tag)
            .map(|(_, d)| d.as_str())
            .collect()
    }

    // On the genome AC1_1 is 0-10000, AC2_1 6000-16000, AC3_1 5000-15000, AC4_1 1000-11000.
    // AC3/AC4 and AC1/AC2 make two rafts, then the noisy AC3/AC2 edge joins them
    // although both rafts run on for 5000 bases left of its alignment.
    fn overhanging_rafts() -> Vec<Psl> {
        vec![
            Psl::ungapped("AC4_1", 10000, 4000, "AC3_1", 10000, 0, 6000, "+"),
            Psl::ungapped("AC1_1", 10000, 6000, "AC2_1", 10000, 0, 4000, "+"),
            noisy(Psl::ungapped("AC3_1", 10000, 1000, "AC2_1", 10000, 0, 9000, "+"), 90),
        ]
    }

    fn assert_each_frag_once(contig: &Contig, set: &RaftSet) {
        let mut seen = vec![0; contig.frags.len()];
        for r in set.live() {
            for rf in &set.rafts[r].frags {
                seen[rf.frag] += 1;
                assert_eq!(set.raft_of(rf.frag), Some(r));
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "{:?}", seen);
    }

    #[test]
    fn test_two_frags() {
        let contig = contig_of(&[1000, 1000]);
        let psls = vec![Psl::ungapped("AC1_1", 1000, 800, "AC2_1", 1000, 0, 200, "+")];
        let (set, _) = rafts_for(&contig, &psls);

        let live = set.live();
        assert_eq!(live.len(), 1);
        let raft = &set.rafts[live[0]];
        assert_eq!(raft.size(), 1800);
        assert_eq!(raft.edge_refs.len(), 1);
        assert_eq!(
            raft.frags,
            vec![
                RaftFrag { frag: 0, offset: 0, orientation: 1 },
                RaftFrag { frag: 1, offset: 800, orientation: 1 },
            ]
        );
    }

    #[test]
    fn test_reverse_pair() {
        let contig = contig_of(&[1000, 1000]);
        // start of AC2_1 on the minus strand matches the end of AC1_1
        let psls = vec![Psl::ungapped("AC2_1", 1000, 0, "AC1_1", 1000, 800, 200, "-")];
        let (set, _) = rafts_for(&contig, &psls);
        let raft = &set.rafts[set.live()[0]];
        assert_eq!(raft.size(), 1800);
        assert_eq!(raft.frags[1], RaftFrag { frag: 1, offset: 800, orientation: -1 });
    }

    #[test]
    fn test_chain_of_three() {
        let contig = contig_of(&[1000, 1000, 1000]);
        let psls = vec![
            Psl::ungapped("AC1_1", 1000, 800, "AC2_1", 1000, 0, 200, "+"),
            Psl::ungapped("AC2_1", 1000, 700, "AC3_1", 1000, 0, 300, "+"),
        ];
        let (set, _) = rafts_for(&contig, &psls);
        let live = set.live();
        assert_eq!(live.len(), 1);
        let raft = &set.rafts[live[0]];
        assert_eq!(raft.size(), 3000 - 200 - 300);
        let order: Vec<_> = raft.frags.iter().map(|rf| rf.frag).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(raft.frags[2].offset, 1500);
        assert_each_frag_once(&contig, &set);
    }

    #[test]
    fn test_merge_two_rafts() {
        let contig = contig_of(&[1000, 1000, 1000, 1000]);
        let psls = vec![
            // strongest first: 1-2 and 3-4, then 2-3 joins the rafts
            Psl::ungapped("AC1_1", 1000, 600, "AC2_1", 1000, 0, 400, "+"),
            Psl::ungapped("AC3_1", 1000, 600, "AC4_1", 1000, 0, 400, "+"),
            Psl::ungapped("AC2_1", 1000, 900, "AC3_1", 1000, 0, 100, "+"),
        ];
        let (set, diag) = rafts_for(&contig, &psls);
        let live = set.live();
        assert_eq!(live.len(), 1);
        assert!(diag.contains("merge"));
        let raft = &set.rafts[live[0]];
        assert_eq!(raft.size(), 4000 - 400 - 400 - 100);
        assert_eq!(raft.edge_refs.len(), 3);
        assert_each_frag_once(&contig, &set);
    }

    #[test]
    fn test_conflicting_orientation() {
        let contig = contig_of(&[1000, 1000]);
        let psls = vec![
            Psl::ungapped("AC1_1", 1000, 800, "AC2_1", 1000, 0, 200, "+"),
            // weaker, opposite strand
            Psl::ungapped("AC2_1", 1000, 0, "AC1_1", 1000, 900, 100, "-"),
        ];
        let (set, diag) = rafts_for(&contig, &psls);
        let raft = &set.rafts[set.live()[0]];
        assert_eq!(raft.edge_refs.len(), 1);
        assert_eq!(diag.tally.rejected_of(Rejection::ConflictingEdge), 1);
    }

    #[test]
    fn test_singletons() {
        let contig = contig_of(&[1000, 1000, 500]);
        let psls = vec![Psl::ungapped("AC1_1", 1000, 800, "AC2_1", 1000, 0, 200, "+")];
        let (set, _) = rafts_for(&contig, &psls);
        let live = set.live();
        assert_eq!(live.len(), 2);
        let single = &set.rafts[live[1]];
        assert_eq!(single.frags, vec![RaftFrag { frag: 2, offset: 0, orientation: 1 }]);
        assert_eq!(single.size(), 500);
        assert_eq!(single.id, 2);
        assert_each_frag_once(&contig, &set);
    }

    #[test]
    fn test_flip_frags() {
        let contig = contig_of(&[1000, 1000]);
        let psls = vec![Psl::ungapped("AC1_1", 1000, 800, "AC2_1", 1000, 0, 200, "+")];
        let (mut set, _) = rafts_for(&contig, &psls);
        let r = set.live()[0];
        set.rafts[r].flip_frags(&contig);
        assert_eq!(
            set.rafts[r].frags,
            vec![
                RaftFrag { frag: 1, offset: 0, orientation: -1 },
                RaftFrag { frag: 0, offset: 800, orientation: -1 },
            ]
        );
        set.rafts[r].flip_frags(&contig);
        assert_eq!(set.rafts[r].frags[0], RaftFrag { frag: 0, offset: 0, orientation: 1 });
    }

    #[test]
    fn test_extension_blocked_by_interior_mismatch() {
        let contig = contig_of(&[10000, 10000, 8000]);
        let psls = vec![
            Psl::ungapped("AC1_1", 10000, 5000, "AC2_1", 10000, 0, 5000, "+"),
            // AC3 ends on the start of AC2, so it would lie over AC1 without aligning to it
            Psl::ungapped("AC3_1", 8000, 6000, "AC2_1", 10000, 0, 2000, "+"),
        ];
        let (set, diag) = rafts_for(&contig, &psls);
        assert_eq!(set.raft_of(0), set.raft_of(1));
        assert_ne!(set.raft_of(2), set.raft_of(1));
        assert_eq!(diag.tally.rejected_of(Rejection::FailedExtension), 1);
        assert_each_frag_once(&contig, &set);
    }

    #[test]
    fn test_merge_past_overhang() {
        let contig = contig_of(&[10000, 10000, 10000, 10000]);
        let mut psls = overhanging_rafts();
        // AC4/AC1 lies on the same diagonal and covers the overhang
        psls.push(noisy(
            Psl::ungapped("AC4_1", 10000, 0, "AC1_1", 10000, 1000, 9000, "+"),
            180,
        ));
        let (set, diag) = rafts_for(&contig, &psls);

        let live = set.live();
        assert_eq!(live.len(), 1);
        assert_eq!(diag.tally.rejected_of(Rejection::DeferredMerge), 0);
        assert_eq!(diag.tally.merged, 1);
        let raft = &set.rafts[live[0]];
        assert_eq!(raft.size(), 16000);
        assert_eq!(raft.edge_refs.len(), 4);
        let offsets: Vec<(FragId, i32)> = raft.frags.iter().map(|rf| (rf.frag, rf.offset)).collect();
        assert_eq!(offsets, vec![(0, 0), (3, 1000), (2, 5000), (1, 6000)]);
        assert_each_frag_once(&contig, &set);
    }

    #[test]
    fn test_merge_deferred() {
        let contig = contig_of(&[10000, 10000, 10000, 10000]);
        let (set, diag) = rafts_for(&contig, &overhanging_rafts());

        // nothing aligns the overhangs, so the rafts stay apart
        assert_eq!(set.live().len(), 2);
        assert_ne!(set.raft_of(1), set.raft_of(2));
        assert_eq!(diag.tally.rejected_of(Rejection::DeferredMerge), 1);
        let deferred = details(&diag, Rejection::DeferredMerge.as_str());
        assert!(deferred[0].starts_with("AC3_1 -> AC2_1"));
        assert!(deferred[0].contains("disagree past the overlap"));
        assert!(details(&diag, "accept")
            .iter()
            .all(|d| !d.contains("merges ok after all")));
        assert_each_frag_once(&contig, &set);
    }

    #[test]
    fn test_deferred_edge_joins_later_merge() {
        let contig = contig_of(&[10000, 10000, 10000, 10000]);
        let mut psls = overhanging_rafts();
        // AC4/AC1 stops 1000 bases short of AC4's start, too short to cover the
        // first overhang, but merges the rafts once the AC3/AC2 edge covers its own
        psls.push(Psl::ungapped("AC4_1", 10000, 1000, "AC1_1", 10000, 2000, 8000, "+"));
        let (set, diag) = rafts_for(&contig, &psls);

        let live = set.live();
        assert_eq!(live.len(), 1);
        assert_eq!(diag.tally.rejected_of(Rejection::DeferredMerge), 1);
        assert_eq!(diag.tally.merged, 1);
        let later = details(&diag, "accept");
        assert!(later
            .iter()
            .any(|d| d.starts_with("AC3_1 -> AC2_1") && d.contains("merges ok after all")));

        let raft = &set.rafts[live[0]];
        // the deferred AC3/AC2 edge is the third one
        assert!(raft.edge_refs.contains(&2));
        assert_eq!(raft.edge_refs.len(), 4);
        assert_eq!(raft.size(), 16000);
        assert_each_frag_once(&contig, &set);
    }

    // On the genome AC1_1 is 0-10000 and AC2_1 4000-14000, the short raft;
    // AC3_1 12000-22000, AC4_1 16000-26000 and AC5_1 20000-30000, the long one.
    // AC6_1 at 7000-17000 aligns best to AC2_1 and a little worse to AC3_1.
    fn competing_sockets() -> (Contig, Vec<Psl>) {
        let contig = contig_of(&[10000; 6]);
        let psls = vec![
            Psl::ungapped("AC1_1", 10000, 4000, "AC2_1", 10000, 0, 6000, "+"),
            Psl::ungapped("AC3_1", 10000, 4000, "AC4_1", 10000, 0, 6000, "+"),
            Psl::ungapped("AC4_1", 10000, 4000, "AC5_1", 10000, 0, 6000, "+"),
            Psl::ungapped("AC3_1", 10000, 8000, "AC5_1", 10000, 0, 2000, "+"),
            noisy(Psl::ungapped("AC6_1", 10000, 0, "AC2_1", 10000, 3000, 7000, "+"), 30),
            noisy(Psl::ungapped("AC6_1", 10000, 5000, "AC3_1", 10000, 0, 5000, "+"), 20),
        ];
        (contig, psls)
    }

    #[test]
    fn test_requeue_for_longer_raft() {
        let (contig, psls) = competing_sockets();
        let (set, diag) = rafts_for(&contig, &psls);

        // AC6_1 steps aside once and goes into the long raft
        let extends = details(&diag, "accept");
        let joined: Vec<&&str> = extends.iter().filter(|d| d.contains("extends raft")).collect();
        assert_eq!(joined.len(), 2);
        assert!(joined[1].starts_with("AC6_1 -> AC3_1"));
        assert!(joined[1].ends_with("extends raft 2"));

        // the edge it passed over then merges the two rafts
        assert_eq!(set.live().len(), 1);
        assert_eq!(diag.tally.merged, 1);
        assert_each_frag_once(&contig, &set);
    }

    #[test]
    fn test_requeue_cap() {
        let (contig, psls) = competing_sockets();
        let cfg = AssemblyConfig {
            max_requeue: 0,
            ..Default::default()
        };
        let (set, diag) = rafts_with(&contig, &psls, &cfg);

        // no second chances: AC6_1 takes the first edge it meets
        let extends = details(&diag, "accept");
        let joined: Vec<&&str> = extends.iter().filter(|d| d.contains("extends raft")).collect();
        assert_eq!(joined.len(), 2);
        assert!(joined[1].starts_with("AC2_1 -> AC6_1"));
        assert!(joined[1].ends_with("extends raft 1"));

        assert_eq!(set.live().len(), 1);
        assert_eq!(diag.tally.merged, 1);
        assert_each_frag_once(&contig, &set);
    }
}
