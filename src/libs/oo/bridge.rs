use crate::libs::oo::config::AssemblyConfig;
use crate::libs::oo::diag::{Diagnostics, Rejection};
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::evidence::{LineGraph, Member};
use crate::libs::oo::graph::{Cable, CableKind, FlipOutcome, NodeKind, RaftGraph};
use crate::libs::oo::model::{BargeId, CloneId, Contig};
use crate::libs::oo::raft::{RaftId, RaftSet};
use petgraph::graph::NodeIndex;
use petgraph::graphmap::UnGraphMap;

/// The raft graph plus the bookkeeping needed to feed it line graphs.
#[derive(Debug, Clone)]
pub struct BridgeGraph {
    pub graph: RaftGraph,
    pub anchor: NodeIndex,
    raft_nodes: Vec<Option<NodeIndex>>,
    clone_nodes: Vec<Option<(NodeIndex, NodeIndex)>>,
    /// Barges joined by some accepted line
    pub barge_links: UnGraphMap<BargeId, ()>,
}

/// Valued component touched by a line, with the links that land in it.
struct Touched {
    nodes: Vec<NodeIndex>,
    links: Vec<usize>,
    orientation: i8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub accepted: usize,
    pub conflicted: usize,
}

impl BridgeGraph {
    /// Clone start and end nodes chained in map order, the anchor, and one node per raft
    /// held between the ends of the clones it comes from.
    pub fn skeleton(contig: &Contig, rafts: &RaftSet, diag: &mut dyn Diagnostics) -> Self {
        let mut graph = RaftGraph::new();
        let mut clone_nodes = vec![None; contig.clones.len()];

        let mut last_end: Option<NodeIndex> = None;
        for barge in &contig.barges {
            let mut ceps: Vec<(i32, CloneId, bool)> = vec![];
            for el in &barge.clones {
                let size = contig.clones[el.clone].size;
                ceps.push((el.offset, el.clone, false));
                ceps.push((el.offset + size, el.clone, true));
            }
            ceps.sort_by_key(|c| c.0);

            let mut starts = vec![None; contig.clones.len()];
            let mut prev: Option<NodeIndex> = None;
            let mut first: Option<NodeIndex> = None;
            for &(_, clone, is_end) in &ceps {
                let name = &contig.clones[clone].name;
                let node = if is_end {
                    let node = graph.add_node(&format!("end-{}", name), NodeKind::CloneEnd(clone));
                    if let Some(start) = starts[clone] {
                        clone_nodes[clone] = Some((start, node));
                    }
                    node
                } else {
                    let node = graph.add_node(&format!("start-{}", name), NodeKind::CloneStart(clone));
                    starts[clone] = Some(node);
                    node
                };
                if let Some(p) = prev {
                    graph.add_dummy_cable(p, node);
                }
                first.get_or_insert(node);
                prev = Some(node);
            }
            if let (Some(end), Some(start)) = (last_end, first) {
                graph.add_dummy_cable(end, start);
            }
            if prev.is_some() {
                last_end = prev;
            }
        }

        let anchor = graph.add_node("fixed", NodeKind::Anchor);

        let mut raft_nodes = vec![None; rafts.rafts.len()];
        for r in rafts.live() {
            let raft = &rafts.rafts[r];
            let node = graph.add_node(&raft.id.to_string(), NodeKind::Raft(r));
            raft_nodes[r] = Some(node);

            match raft_bounds(contig, rafts, r) {
                Some((start, end)) => match (clone_nodes[start], clone_nodes[end]) {
                    (Some((s, _)), Some((_, e))) => {
                        graph.add_dummy_cable(s, node);
                        graph.add_dummy_cable(node, e);
                    }
                    _ => diag.record_degraded(&format!("raft {} lies outside every barge", raft.id)),
                },
                None => diag.record_degraded(&format!("raft {} lies in multiple barges", raft.id)),
            }
        }

        Self {
            graph,
            anchor,
            raft_nodes,
            clone_nodes,
            barge_links: UnGraphMap::new(),
        }
    }

    pub fn node_of(&self, member: Member) -> Option<NodeIndex> {
        match member {
            Member::Anchor => Some(self.anchor),
            Member::Raft(r) => self.raft_nodes.get(r).copied().flatten(),
        }
    }

    pub fn raft_node(&self, raft: RaftId) -> Option<NodeIndex> {
        self.node_of(Member::Raft(raft))
    }

    pub fn clone_nodes(&self, clone: CloneId) -> Option<(NodeIndex, NodeIndex)> {
        self.clone_nodes.get(clone).copied().flatten()
    }

    pub fn raft_at(&self, node: NodeIndex) -> Option<RaftId> {
        match self.graph.graph[node].kind {
            NodeKind::Raft(r) => Some(r),
            _ => None,
        }
    }

    /// Barges next to each other in file order that some line connects.
    pub fn barges_bridged(&self, a: BargeId, b: BargeId) -> bool {
        self.barge_links.contains_edge(a, b)
    }

    /// Flips a component in the graph and turns its rafts around.
    pub fn flip(&mut self, nodes: &[NodeIndex], rafts: &mut RaftSet) -> FlipOutcome {
        let outcome = self.graph.flip_component(nodes);
        if outcome == FlipOutcome::Flipped {
            for &n in nodes {
                if let Some(r) = self.raft_at(n) {
                    rafts.rafts[r].orientation = -rafts.rafts[r].orientation;
                }
            }
        }
        outcome
    }

    fn member_orientation(&self, member: Member, rafts: &RaftSet) -> i8 {
        match member {
            Member::Anchor => 1,
            Member::Raft(r) => rafts.rafts[r].orientation,
        }
    }

    /// Offset of `position` from the centre of the member, in graph direction.
    fn center_offset(&self, member: Member, position: i32, rafts: &RaftSet) -> i32 {
        match member {
            Member::Anchor => -position,
            Member::Raft(r) => {
                let raft = &rafts.rafts[r];
                let center = raft.end / 2;
                if raft.orientation > 0 {
                    center - position
                } else {
                    position - center
                }
            }
        }
    }

    fn member_size(&self, member: Member, rafts: &RaftSet) -> i32 {
        match member {
            Member::Anchor => 0,
            Member::Raft(r) => rafts.rafts[r].end,
        }
    }

    /// Allowed distance between consecutive links `i` and `i + 1`.
    pub fn pair_range(&self, line: &LineGraph, i: usize, rafts: &RaftSet, cfg: &AssemblyConfig) -> (i32, i32) {
        let (a, b) = (&line.links[i], &line.links[i + 1]);
        let a_cen = self.center_offset(a.member, a.position, rafts);
        let b_cen = self.center_offset(b.member, b.position, rafts);
        let sizes = self.member_size(a.member, rafts) + self.member_size(b.member, rafts);
        let min = ((cfg.scoring.min_gap_fraction * sizes as f64).round() as i32)
            .max(line.min - a_cen + b_cen);
        let max = line.max - a_cen + b_cen + cfg.estimated_read_size;
        (min, max)
    }

    fn touched_components(&self, nodes: &[NodeIndex]) -> Vec<Touched> {
        let mut comps: Vec<Touched> = vec![];
        let mut owner = vec![None; self.graph.graph.node_count()];
        for (i, &node) in nodes.iter().enumerate() {
            let c = match owner[node.index()] {
                Some(c) => c,
                None => {
                    let members = self.graph.component_of(node);
                    for m in &members {
                        owner[m.index()] = Some(comps.len());
                    }
                    comps.push(Touched {
                        nodes: members,
                        links: vec![],
                        orientation: 0,
                    });
                    comps.len() - 1
                }
            };
            comps[c].links.push(i);
        }
        comps
    }

    /// One attempt at fitting `line` into the graph as it reads.
    ///
    /// Orientations assigned and components flipped along the way stay in place
    /// even when a later check fails.
    fn try_line(
        &mut self,
        line: &mut LineGraph,
        rafts: &mut RaftSet,
        cfg: &AssemblyConfig,
    ) -> Result<(), Rejection> {
        if line.links.len() < 2 {
            return Err(Rejection::ShortLine);
        }
        let nodes = line
            .links
            .iter()
            .map(|l| self.node_of(l.member))
            .collect::<Option<Vec<_>>>()
            .ok_or(Rejection::ShortLine)?;

        let mut comps = self.touched_components(&nodes);
        for comp in comps.iter_mut() {
            let first = line.links[comp.links[0]].member;
            if let Member::Raft(r) = first {
                if comp.nodes.len() == 1 && rafts.rafts[r].orientation == 0 {
                    rafts.rafts[r].orientation = line.links[comp.links[0]].orientation;
                }
            }
            let orient = |i: usize| line.links[i].orientation * self.member_orientation(line.links[i].member, rafts);
            let initial = orient(comp.links[0]);
            if comp.links.iter().any(|&i| orient(i) != initial) {
                return Err(Rejection::OrientationConflict);
            }
            comp.orientation = initial;
        }

        for comp in &comps {
            if comp.orientation < 0 {
                if self.flip(&comp.nodes, rafts) != FlipOutcome::Flipped {
                    return Err(Rejection::FlipRefused);
                }
                for &i in &comp.links {
                    line.links[i].orientation = -line.links[i].orientation;
                }
            }
        }

        let pairs: Vec<(NodeIndex, NodeIndex)> = nodes.windows(2).map(|w| (w[0], w[1])).collect();
        if self.graph.would_add_cycle(&pairs) {
            return Err(Rejection::WouldCycle);
        }

        let mut ranges = vec![];
        for (i, &(a, b)) in pairs.iter().enumerate() {
            let (min, max) = self.pair_range(line, i, rafts, cfg);
            if min > max {
                return Err(Rejection::ImpossibleRange);
            }
            if !self.graph.range_consistent_with(a, b, min, max) {
                return Err(Rejection::InconsistentRange);
            }
            ranges.push((min, max));
        }

        for (i, (&(a, b), (min, max))) in pairs.iter().zip(ranges).enumerate() {
            let (la, lb) = (&line.links[i], &line.links[i + 1]);
            let cable = Cable {
                a_name: la.name.clone(),
                b_name: lb.name.clone(),
                a_orientation: la.orientation,
                b_orientation: lb.orientation,
                kind: line.kind,
                min,
                max,
            };
            self.graph.add_cable(a, b, cable);
        }

        if line.kind != CableKind::BigRaft {
            let barges: Vec<Option<BargeId>> = line
                .links
                .iter()
                .map(|l| match l.member {
                    Member::Raft(r) => rafts.rafts[r].barge,
                    Member::Anchor => None,
                })
                .collect();
            for w in barges.windows(2) {
                if let (Some(x), Some(y)) = (w[0], w[1]) {
                    if x != y {
                        self.barge_links.add_edge(x, y, ());
                    }
                }
            }
        }
        Ok(())
    }

    /// Tries `line` as given, then reversed. The line is left as it was accepted.
    pub fn add_line(
        &mut self,
        line: &mut LineGraph,
        rafts: &mut RaftSet,
        cfg: &AssemblyConfig,
        diag: &mut dyn Diagnostics,
    ) -> Result<bool, AssemblyError> {
        let mut reasons = vec![];
        let mut accepted = false;
        for _ in 0..2 {
            match self.try_line(line, rafts, cfg) {
                Ok(()) => {
                    accepted = true;
                    break;
                }
                Err(kind) => {
                    reasons.push(kind);
                    line.reverse();
                }
            }
        }

        if accepted {
            diag.record_accept(&line.label());
        } else if let Some(&kind) = reasons.last() {
            let why: Vec<&str> = reasons.iter().map(|r| r.as_str()).collect();
            diag.record_rejection(kind, &format!("{} ({})", line.label(), why.join(", then ")));
        }

        if self.graph.has_cycles() {
            return Err(AssemblyError::Internal(format!(
                "raft graph became cyclic after {}",
                line.label()
            )));
        }
        Ok(accepted)
    }

    /// Adds the lines best first.
    pub fn add_lines(
        &mut self,
        lines: &mut [LineGraph],
        rafts: &mut RaftSet,
        cfg: &AssemblyConfig,
        diag: &mut dyn Diagnostics,
    ) -> Result<LineCounts, AssemblyError> {
        let mut counts = LineCounts::default();
        for line in lines.iter_mut() {
            if self.add_line(line, rafts, cfg, diag)? {
                counts.accepted += 1;
            } else {
                counts.conflicted += 1;
            }
        }
        log::info!("{} lines ok, {} conflicted", counts.accepted, counts.conflicted);
        Ok(counts)
    }
}

/// First and last clones of the barge a raft lies in.
///
/// `None` when the raft spans barges or sits in none.
fn raft_bounds(contig: &Contig, rafts: &RaftSet, raft: RaftId) -> Option<(CloneId, CloneId)> {
    let frags = &rafts.rafts[raft].frags;
    let first_clone = contig.frags[frags.first()?.frag].clone;
    if frags.iter().all(|rf| contig.frags[rf.frag].clone == first_clone) {
        return Some((first_clone, first_clone));
    }

    let barge = contig.clones[first_clone].barge?;
    if frags
        .iter()
        .any(|rf| contig.frag_barge(rf.frag) != Some(barge))
    {
        return None;
    }
    let mut start = None;
    let mut end = None;
    let mut max_end = i32::MIN;
    for el in &contig.barges[barge].clones {
        if frags.iter().any(|rf| contig.frags[rf.frag].clone == el.clone) {
            start.get_or_insert(el.clone);
            let end_pos = el.offset + contig.clones[el.clone].size;
            if end_pos > max_end {
                max_end = end_pos;
                end = Some(el.clone);
            }
        }
    }
    Some((start?, end?))
}
