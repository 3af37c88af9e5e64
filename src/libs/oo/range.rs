//! Satisfiability of distance ranges between nodes.
//!
//! A range `a -> b [min, max]` asks for positions with `min <= x_b - x_a <= max`.
//! Each range becomes two difference constraints, and the whole set is solvable
//! exactly when the constraint graph has no negative cycle.

/// Allowed distance from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEdge {
    pub from: usize,
    pub to: usize,
    pub min: i64,
    pub max: i64,
}

impl RangeEdge {
    pub fn new(from: usize, to: usize, min: i64, max: i64) -> Self {
        Self { from, to, min, max }
    }

    /// Both ends among the first `node_count` nodes, and a non-empty range.
    fn is_valid(&self, node_count: usize) -> bool {
        self.from < node_count && self.to < node_count && self.min <= self.max
    }
}

/// Bellman-Ford from a virtual source joined to every node with weight 0.
///
/// ```
/// use oog::libs::oo::range::{is_consistent, RangeEdge};
/// // a -> b [10, 20], b -> c [10, 20], a -> c [0, 25]
/// let edges = vec![
///     RangeEdge::new(0, 1, 10, 20),
///     RangeEdge::new(1, 2, 10, 20),
///     RangeEdge::new(0, 2, 0, 25),
/// ];
/// assert!(is_consistent(3, &edges));
///
/// // a -> c must now be at most 15, but a -> b -> c is at least 20
/// let edges = vec![
///     RangeEdge::new(0, 1, 10, 20),
///     RangeEdge::new(1, 2, 10, 20),
///     RangeEdge::new(0, 2, 0, 15),
/// ];
/// assert!(!is_consistent(3, &edges));
/// ```
pub fn is_consistent(node_count: usize, edges: &[RangeEdge]) -> bool {
    if !edges.iter().all(|e| e.is_valid(node_count)) {
        return false;
    }
    relax(node_count, edges.iter())
}

/// Would `candidate` keep `edges` satisfiable? `edges` is left untouched.
pub fn added_range_consistent(node_count: usize, edges: &[RangeEdge], candidate: RangeEdge) -> bool {
    if !candidate.is_valid(node_count) || !edges.iter().all(|e| e.is_valid(node_count)) {
        return false;
    }
    relax(node_count, edges.iter().chain(std::iter::once(&candidate)))
}

fn relax<'a, I>(node_count: usize, edges: I) -> bool
where
    I: Iterator<Item = &'a RangeEdge> + Clone,
{
    // Start every node at 0: the virtual source already relaxed its edges
    let mut dist = vec![0i64; node_count];

    // The virtual source makes node_count + 1 nodes, so node_count rounds settle any solvable system
    for _ in 0..=node_count {
        let mut changed = false;
        for e in edges.clone() {
            // x_to <= x_from + max
            if dist[e.from] + e.max < dist[e.to] {
                dist[e.to] = dist[e.from] + e.max;
                changed = true;
            }
            // x_from <= x_to - min
            if dist[e.to] - e.min < dist[e.from] {
                dist[e.from] = dist[e.to] - e.min;
                changed = true;
            }
        }
        if !changed {
            return true;
        }
    }

    false
}
