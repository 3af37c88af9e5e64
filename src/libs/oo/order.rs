use crate::libs::oo::bridge::BridgeGraph;
use crate::libs::oo::config::AssemblyConfig;
use crate::libs::oo::diag::Diagnostics;
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::graph::{FlipOutcome, NodeKind};
use crate::libs::oo::model::Contig;
use crate::libs::oo::raft::{RaftId, RaftSet};
use petgraph::graph::NodeIndex;

/// Size weighted mean of the fragments' default positions.
pub fn raft_default_position(contig: &Contig, rafts: &RaftSet, raft: RaftId) -> i32 {
    let mut total = 0.0;
    let mut weighted = 0.0;
    for rf in &rafts.rafts[raft].frags {
        let frag = &contig.frags[rf.frag];
        total += frag.size as f64;
        weighted += frag.size as f64 * frag.default_pos as f64;
    }
    if total == 0.0 {
        0
    } else {
        (weighted / total).round() as i32
    }
}

pub fn set_default_positions(contig: &Contig, rafts: &mut RaftSet) {
    for r in rafts.live() {
        rafts.rafts[r].default_pos = raft_default_position(contig, rafts, r);
    }
}

/// How much a raft wants to be turned around, negative meaning reversed.
///
/// Fragments must be sorted by offset.
pub fn flip_tendency(contig: &Contig, rafts: &RaftSet, raft: RaftId) -> i32 {
    let frags = &rafts.rafts[raft].frags;
    let mut total = 0;
    for (i, rf) in frags.iter().enumerate() {
        let frag = &contig.frags[rf.frag];
        total += contig.clones[frag.clone].flip_tendency * rf.orientation as i32;
        if let Some(next) = frags.get(i + 1) {
            let dif = contig.frags[next.frag].default_pos - frag.default_pos;
            total += dif.clamp(-frag.size, frag.size);
        }
    }
    total
}

pub fn set_flip_tendencies(contig: &Contig, rafts: &mut RaftSet) {
    for r in rafts.live() {
        rafts.rafts[r].flip_tendency = flip_tendency(contig, rafts, r);
        log::debug!("raft {} flip tendency {}", rafts.rafts[r].id, rafts.rafts[r].flip_tendency);
    }
}

/// Turns around components that sit better the other way on the map.
///
/// Returns the number of components flipped.
pub fn flip_near_defaults(
    bridges: &mut BridgeGraph,
    rafts: &mut RaftSet,
    cfg: &AssemblyConfig,
    diag: &mut dyn Diagnostics,
) -> usize {
    let mut flipped = 0;
    for comp in bridges.graph.components() {
        let mut tendency: i64 = 0;
        for (i, &node) in comp.iter().enumerate() {
            let (own, pos) = match bridges.raft_at(node) {
                Some(r) => {
                    let raft = &mut rafts.rafts[r];
                    if raft.orientation == 0 {
                        raft.orientation = 1;
                    }
                    (raft.flip_tendency as i64 * raft.orientation as i64, raft.default_pos)
                }
                None => (0, 0),
            };
            tendency += own;
            if let Some(&next) = comp.get(i + 1) {
                let next_pos = bridges.raft_at(next).map_or(0, |r| rafts.rafts[r].default_pos);
                let mut distance = (next_pos - pos) as i64;
                if bridges.graph.path_exists(next, node) {
                    distance = -distance;
                }
                tendency += cfg.scoring.flip_distance_weight * distance;
            }
        }

        if tendency < 0 {
            let outcome = bridges.flip(&comp, rafts);
            log::debug!("flipping tendency {}: {:?}", tendency, outcome);
            match outcome {
                FlipOutcome::Flipped => flipped += 1,
                FlipOutcome::Anchored => {}
                FlipOutcome::WouldCycle => diag.record_degraded(&format!(
                    "component of {} rafts kept against tendency {}",
                    comp.len(),
                    tendency
                )),
            }
        }
    }
    flipped
}

/// Priority of a node for the final order: default positions, the anchor first.
pub fn node_priority(bridges: &BridgeGraph, contig: &Contig, rafts: &RaftSet, node: NodeIndex) -> i64 {
    match bridges.graph.graph[node].kind {
        NodeKind::Anchor => 0,
        NodeKind::Raft(r) => rafts.rafts[r].default_pos as i64,
        NodeKind::CloneStart(c) => contig.clones[c].default_pos as i64,
        NodeKind::CloneEnd(c) => (contig.clones[c].default_pos + contig.clones[c].size) as i64,
    }
}

/// Rafts in an order that respects every edge and otherwise follows the map.
pub fn order_rafts(
    bridges: &BridgeGraph,
    contig: &Contig,
    rafts: &RaftSet,
) -> Result<Vec<RaftId>, AssemblyError> {
    let order = bridges
        .graph
        .priority_order(|n| node_priority(bridges, contig, rafts, n))?;
    Ok(order.into_iter().filter_map(|n| bridges.raft_at(n)).collect())
}
