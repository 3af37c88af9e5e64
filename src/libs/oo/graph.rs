//! Directed graph of rafts, clone ends and the bridges between them.
//!
//! An edge `a -> b` says `b` lies to the right of `a`. Its bridge carries the
//! allowed distance range and every cable of evidence behind it.

use crate::libs::oo::config::{BIGNUM, DUMMY_MAX};
use crate::libs::oo::error::AssemblyError;
use crate::libs::oo::model::CloneId;
use crate::libs::oo::raft::RaftId;
use crate::libs::oo::range::{added_range_consistent, RangeEdge};
use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Anchor,
    Raft(RaftId),
    CloneStart(CloneId),
    CloneEnd(CloneId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub name: String,
    pub kind: NodeKind,
}

impl GraphNode {
    /// Rafts and the anchor carry sequence, clone ends are placeholders.
    pub fn has_value(&self) -> bool {
        matches!(self.kind, NodeKind::Anchor | NodeKind::Raft(_))
    }
}

/// Source of a cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CableKind {
    #[serde(rename = "readPair")]
    ReadPair,
    #[serde(rename = "mRNA")]
    Mrna,
    #[serde(rename = "EST")]
    Est,
    #[serde(rename = "estPair")]
    EstPair,
    #[serde(rename = "bacEndPair")]
    BacEndPair,
    #[serde(rename = "cloneEnds")]
    CloneEnds,
    #[serde(rename = "chain")]
    Chain,
    #[serde(rename = "bigRaft")]
    BigRaft,
}

impl CableKind {
    pub fn name(&self) -> &'static str {
        match self {
            CableKind::ReadPair => "readPair",
            CableKind::Mrna => "mRNA",
            CableKind::Est => "EST",
            CableKind::EstPair => "estPair",
            CableKind::BacEndPair => "bacEndPair",
            CableKind::CloneEnds => "cloneEnds",
            CableKind::Chain => "chain",
            CableKind::BigRaft => "bigRaft",
        }
    }

    /// Transcripts name a single sequence rather than a pair.
    pub fn is_transcript(&self) -> bool {
        matches!(self, CableKind::Mrna | CableKind::Est)
    }
}

/// One piece of evidence for an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cable {
    pub a_name: String,
    pub b_name: String,
    pub a_orientation: i8,
    pub b_orientation: i8,
    pub kind: CableKind,
    pub min: i32,
    pub max: i32,
}

/// Value of an edge: the intersection of its cables' ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bridge {
    pub min: i32,
    pub max: i32,
    pub cables: Vec<Cable>,
}

impl Bridge {
    /// `[0, BIGNUM]` puts no limit on the distance.
    pub fn is_unconstrained(&self) -> bool {
        self.min == 0 && self.max == BIGNUM
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipOutcome {
    Flipped,
    /// The component holds the anchor
    Anchored,
    WouldCycle,
}

#[derive(Debug, Clone, Default)]
pub struct RaftGraph {
    pub graph: DiGraph<GraphNode, Bridge>,
    anchor: Option<NodeIndex>,
}

impl RaftGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str, kind: NodeKind) -> NodeIndex {
        let idx = self.graph.add_node(GraphNode {
            name: name.to_string(),
            kind,
        });
        if kind == NodeKind::Anchor {
            self.anchor = Some(idx);
        }
        idx
    }

    pub fn anchor(&self) -> Option<NodeIndex> {
        self.anchor
    }

    /// Adds `cable` to the bridge from `a` to `b`, creating the edge when missing.
    ///
    /// Consistency is the caller's business.
    pub fn add_cable(&mut self, a: NodeIndex, b: NodeIndex, cable: Cable) {
        if let Some(e) = self.graph.find_edge(a, b) {
            let bridge = &mut self.graph[e];
            bridge.min = bridge.min.max(cable.min);
            bridge.max = bridge.max.min(cable.max);
            bridge.cables.push(cable);
        } else {
            let bridge = Bridge {
                min: cable.min,
                max: cable.max,
                cables: vec![cable],
            };
            self.graph.add_edge(a, b, bridge);
        }
    }

    /// `b` somewhere after `a`, nothing more.
    pub fn add_dummy_cable(&mut self, a: NodeIndex, b: NodeIndex) {
        let cable = Cable {
            a_name: self.graph[a].name.clone(),
            b_name: self.graph[b].name.clone(),
            a_orientation: 1,
            b_orientation: 1,
            kind: CableKind::CloneEnds,
            min: 0,
            max: DUMMY_MAX,
        };
        self.add_cable(a, b, cable);
    }

    pub fn directly_follows(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.graph.find_edge(a, b).is_some()
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Would connecting each pair, where not yet connected, close a cycle?
    pub fn would_add_cycle(&self, pairs: &[(NodeIndex, NodeIndex)]) -> bool {
        let mut trial = self.graph.map(|_, _| (), |_, _| ());
        for &(a, b) in pairs {
            if !self.directly_follows(a, b) {
                trial.add_edge(a, b, ());
            }
        }
        is_cyclic_directed(&trial)
    }

    pub fn path_exists(&self, a: NodeIndex, b: NodeIndex) -> bool {
        has_path_connecting(&self.graph, a, b, None)
    }

    fn valued_neighbors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(node, Direction::Incoming))
            .filter(move |n| self.graph[*n].has_value())
    }

    /// Valued nodes reachable from `start` in either direction through valued nodes only.
    ///
    /// Breadth first, so `start` comes first.
    pub fn component_of(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = vec![false; self.graph.node_count()];
        self.collect_component(start, &mut seen)
    }

    fn collect_component(&self, start: NodeIndex, seen: &mut [bool]) -> Vec<NodeIndex> {
        let mut comp = vec![];
        let mut queue = VecDeque::new();
        seen[start.index()] = true;
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            comp.push(node);
            for next in self.valued_neighbors(node) {
                if !seen[next.index()] {
                    seen[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }
        comp
    }

    /// Every valued component, in order of its lowest node index.
    pub fn components(&self) -> Vec<Vec<NodeIndex>> {
        let mut seen = vec![false; self.graph.node_count()];
        let mut comps = vec![];
        for node in self.graph.node_indices() {
            if self.graph[node].has_value() && !seen[node.index()] {
                comps.push(self.collect_component(node, &mut seen));
            }
        }
        comps
    }

    /// 1-based component number per node, 0 for clone end nodes.
    pub fn component_numbers(&self) -> Vec<usize> {
        let mut numbers = vec![0; self.graph.node_count()];
        for (i, comp) in self.components().iter().enumerate() {
            for node in comp {
                numbers[node.index()] = i + 1;
            }
        }
        numbers
    }

    /// Does `node` touch any raft or the anchor?
    pub fn has_value_neighbor(&self, node: NodeIndex) -> bool {
        self.valued_neighbors(node).next().is_some()
    }

    /// Reverses every edge with both ends in `nodes`, all at once.
    ///
    /// Nothing changes unless the result stays acyclic.
    pub fn flip_component(&mut self, nodes: &[NodeIndex]) -> FlipOutcome {
        if let Some(anchor) = self.anchor {
            if nodes.contains(&anchor) {
                return FlipOutcome::Anchored;
            }
        }
        let mut inside = vec![false; self.graph.node_count()];
        for n in nodes {
            inside[n.index()] = true;
        }
        let internal = |s: NodeIndex, t: NodeIndex| inside[s.index()] && inside[t.index()];

        let mut trial: DiGraph<(), ()> = DiGraph::with_capacity(self.graph.node_count(), 0);
        for _ in self.graph.node_indices() {
            trial.add_node(());
        }
        for e in self.graph.edge_references() {
            let (s, t) = (e.source(), e.target());
            if internal(s, t) {
                trial.add_edge(t, s, ());
            } else {
                trial.add_edge(s, t, ());
            }
        }
        if is_cyclic_directed(&trial) {
            return FlipOutcome::WouldCycle;
        }

        let old = std::mem::take(&mut self.graph);
        let (nodes_old, edges_old) = old.into_nodes_edges();
        let mut graph = DiGraph::with_capacity(nodes_old.len(), edges_old.len());
        for node in nodes_old {
            graph.add_node(node.weight);
        }
        for edge in edges_old {
            let (s, t) = (edge.source(), edge.target());
            if internal(s, t) {
                graph.add_edge(t, s, edge.weight);
            } else {
                graph.add_edge(s, t, edge.weight);
            }
        }
        self.graph = graph;
        FlipOutcome::Flipped
    }

    /// Every constraining edge as a range for the checker.
    pub fn range_edges(&self) -> Vec<RangeEdge> {
        self.graph
            .edge_references()
            .filter(|e| !e.weight().is_unconstrained())
            .map(|e| {
                RangeEdge::new(
                    e.source().index(),
                    e.target().index(),
                    e.weight().min as i64,
                    e.weight().max as i64,
                )
            })
            .collect()
    }

    /// Could `b` sit `[min, max]` after `a` given every range already in the graph?
    pub fn range_consistent_with(&self, a: NodeIndex, b: NodeIndex, min: i32, max: i32) -> bool {
        added_range_consistent(
            self.graph.node_count(),
            &self.range_edges(),
            RangeEdge::new(a.index(), b.index(), min as i64, max as i64),
        )
    }

    /// Topological order that always takes the ready node of lowest priority.
    ///
    /// Ties go to the lower node index.
    pub fn priority_order<F>(&self, priority: F) -> Result<Vec<NodeIndex>, AssemblyError>
    where
        F: Fn(NodeIndex) -> i64,
    {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready = BinaryHeap::new();
        for n in self.graph.node_indices() {
            if in_degree[n.index()] == 0 {
                ready.push(Reverse((priority(n), n.index())));
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, i))) = ready.pop() {
            let node = NodeIndex::new(i);
            order.push(node);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse((priority(next), next.index())));
                }
            }
        }

        if order.len() != self.graph.node_count() {
            return Err(AssemblyError::Internal(format!(
                "raft graph has a cycle, ordered {} of {} nodes",
                order.len(),
                self.graph.node_count()
            )));
        }
        Ok(order)
    }

    /// Nodes that take part in an edge, then their outgoing edges.
    ///
    /// `orientation` reports the strand of valued nodes.
    pub fn write_text<W, F>(&self, out: &mut W, orientation: F) -> std::io::Result<()>
    where
        W: Write + ?Sized,
        F: Fn(&GraphNode) -> Option<i8>,
    {
        for node in self.graph.node_indices() {
            if self.graph.neighbors_undirected(node).next().is_none() {
                continue;
            }
            let data = &self.graph[node];
            match orientation(data) {
                Some(o) => writeln!(out, "{}\t{}", data.name, strand_char(o))?,
                None => writeln!(out, "{}", data.name)?,
            }
            for e in self.graph.edges_directed(node, Direction::Outgoing) {
                let bridge = e.weight();
                write!(
                    out,
                    "\t{} min {}, max {}, ",
                    self.graph[e.target()].name,
                    bridge.min,
                    bridge.max
                )?;
                for cable in &bridge.cables {
                    if cable.kind.is_transcript() {
                        write!(out, "{}({}),", cable.a_name, cable.kind.name())?;
                    } else {
                        write!(out, "{}&{}({}),", cable.a_name, cable.b_name, cable.kind.name())?;
                    }
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }

    pub fn to_dump<F>(&self, orientation: F) -> GraphDump
    where
        F: Fn(&GraphNode) -> Option<i8>,
    {
        let nodes = self
            .graph
            .node_indices()
            .map(|n| NodeDump {
                name: self.graph[n].name.clone(),
                kind: self.graph[n].kind,
                orientation: orientation(&self.graph[n]),
            })
            .collect();
        let edges = self
            .graph
            .edge_references()
            .map(|e| EdgeDump {
                from: self.graph[e.source()].name.clone(),
                to: self.graph[e.target()].name.clone(),
                bridge: e.weight().clone(),
            })
            .collect();
        GraphDump { nodes, edges }
    }
}

pub fn strand_char(orientation: i8) -> char {
    match orientation {
        o if o > 0 => '+',
        o if o < 0 => '-',
        _ => '?',
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDump {
    pub name: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<i8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub bridge: Bridge,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphDump {
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cable(kind: CableKind, min: i32, max: i32) -> Cable {
        Cable {
            a_name: "x".to_string(),
            b_name: "y".to_string(),
            a_orientation: 1,
            b_orientation: 1,
            kind,
            min,
            max,
        }
    }

    fn three_rafts() -> (RaftGraph, Vec<NodeIndex>) {
        let mut g = RaftGraph::new();
        let nodes = (0..3)
            .map(|i| g.add_node(&format!("{}", i + 1), NodeKind::Raft(i)))
            .collect();
        (g, nodes)
    }

    #[test]
    fn test_add_cable_intersects() {
        let (mut g, n) = three_rafts();
        g.add_cable(n[0], n[1], cable(CableKind::ReadPair, 100, 5000));
        g.add_cable(n[0], n[1], cable(CableKind::Mrna, 1000, 8000));
        assert_eq!(g.graph.edge_count(), 1);
        let e = g.graph.find_edge(n[0], n[1]).unwrap();
        assert_eq!((g.graph[e].min, g.graph[e].max), (1000, 5000));
        assert_eq!(g.graph[e].cables.len(), 2);
        assert!(g.directly_follows(n[0], n[1]));
        assert!(!g.directly_follows(n[1], n[0]));
    }

    #[test]
    fn test_would_add_cycle() {
        let (mut g, n) = three_rafts();
        g.add_dummy_cable(n[0], n[1]);
        g.add_dummy_cable(n[1], n[2]);
        assert!(g.would_add_cycle(&[(n[2], n[0])]));
        assert!(!g.would_add_cycle(&[(n[0], n[2])]));
        // nothing was left behind
        assert_eq!(g.graph.edge_count(), 2);
        assert!(!g.has_cycles());
    }

    #[test]
    fn test_components_skip_clone_ends() {
        let mut g = RaftGraph::new();
        let start = g.add_node("start-AC1", NodeKind::CloneStart(0));
        let a = g.add_node("1", NodeKind::Raft(0));
        let b = g.add_node("2", NodeKind::Raft(1));
        let c = g.add_node("3", NodeKind::Raft(2));
        g.add_dummy_cable(start, a);
        g.add_dummy_cable(start, b);
        g.add_cable(b, c, cable(CableKind::Chain, 0, 100));

        assert_eq!(g.component_of(a), vec![a]);
        assert_eq!(g.component_of(c), vec![c, b]);
        assert_eq!(g.components().len(), 2);
        let numbers = g.component_numbers();
        assert_eq!(numbers[start.index()], 0);
        assert_eq!(numbers[b.index()], numbers[c.index()]);
        assert!(!g.has_value_neighbor(a));
        assert!(g.has_value_neighbor(b));
    }

    #[test]
    fn test_flip_component() {
        let mut g = RaftGraph::new();
        let start = g.add_node("start-AC1", NodeKind::CloneStart(0));
        let a = g.add_node("1", NodeKind::Raft(0));
        let b = g.add_node("2", NodeKind::Raft(1));
        g.add_dummy_cable(start, a);
        g.add_cable(a, b, cable(CableKind::ReadPair, 10, 20));

        assert_eq!(g.flip_component(&[a, b]), FlipOutcome::Flipped);
        assert!(g.directly_follows(b, a));
        assert!(g.directly_follows(start, a));
        let e = g.graph.find_edge(b, a).unwrap();
        assert_eq!(g.graph[e].min, 10);

        let fixed = g.add_node("fixed", NodeKind::Anchor);
        g.add_cable(fixed, b, cable(CableKind::BigRaft, 0, DUMMY_MAX));
        assert_eq!(g.flip_component(&[fixed, a, b]), FlipOutcome::Anchored);
    }

    #[test]
    fn test_flip_refused_on_cycle() {
        let mut g = RaftGraph::new();
        let start = g.add_node("start-AC1", NodeKind::CloneStart(0));
        let a = g.add_node("1", NodeKind::Raft(0));
        let b = g.add_node("2", NodeKind::Raft(1));
        // a -> start -> b, and a -> b: flipping a/b would give b -> a -> start -> b
        g.add_dummy_cable(a, start);
        g.add_dummy_cable(start, b);
        g.add_cable(a, b, cable(CableKind::ReadPair, 10, 20));

        assert_eq!(g.flip_component(&[a, b]), FlipOutcome::WouldCycle);
        assert!(g.directly_follows(a, b));
        assert!(!g.has_cycles());
    }

    #[test]
    fn test_range_checks() {
        let (mut g, n) = three_rafts();
        g.add_cable(n[0], n[1], cable(CableKind::ReadPair, 1000, 2000));
        g.add_cable(n[1], n[2], cable(CableKind::ReadPair, 1000, 2000));
        assert!(g.range_consistent_with(n[0], n[2], 2500, 3000));
        assert!(!g.range_consistent_with(n[0], n[2], 100, 1500));
        assert_eq!(g.range_edges().len(), 2);
    }

    #[test]
    fn test_priority_order() {
        let (mut g, n) = three_rafts();
        g.add_dummy_cable(n[2], n[0]);
        // 2 has the lowest priority but must wait for nothing, 3 must precede 1
        let prio = [10i64, 0, 20];
        let order = g.priority_order(|x| prio[x.index()]).unwrap();
        assert_eq!(order, vec![n[1], n[2], n[0]]);

        g.add_dummy_cable(n[0], n[2]);
        assert!(g.priority_order(|_| 0).is_err());
    }

    #[test]
    fn test_text_dump() {
        let (mut g, n) = three_rafts();
        g.add_cable(
            n[0],
            n[1],
            Cable {
                a_name: "BC1".to_string(),
                b_name: "BC1".to_string(),
                a_orientation: 1,
                b_orientation: -1,
                kind: CableKind::Mrna,
                min: 0,
                max: 500000,
            },
        );
        let mut out = vec![];
        g.write_text(&mut out, |_| Some(1)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "1\t+\n\t2 min 0, max 500000, BC1(mRNA),\n2\t+\n");

        let json = serde_json::to_string(&g.to_dump(|_| None)).unwrap();
        assert!(json.contains("\"kind\":\"mRNA\""));
    }
}
