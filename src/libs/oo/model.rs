use crate::libs::oo::config::{AssemblyConfig, Scoring};
use crate::libs::oo::error::AssemblyError;
use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use serde::Serialize;

pub type FragId = usize;
pub type CloneId = usize;
pub type BargeId = usize;

/// Sequencing phase of a clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Phase {
    Survey,
    Draft,
    Ordered,
    Finished,
}

impl Phase {
    pub fn from_code(code: i32) -> Option<Phase> {
        match code {
            0 => Some(Phase::Survey),
            1 => Some(Phase::Draft),
            2 => Some(Phase::Ordered),
            3 => Some(Phase::Finished),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        *self as i32
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub size: i32,
    pub clone: CloneId,
    /// Offset inside the clone when its fragments are laid end to end
    pub clone_pos: i32,
    pub default_pos: i32,
    pub seq: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CloneInfo {
    pub name: String,
    pub map_pos: i32,
    pub phase: Phase,
    pub flip_tendency: i32,
    pub size: i32,
    pub frags: Vec<FragId>,
    pub barge: Option<BargeId>,
    /// From the map, 0 when unknown
    pub orientation: i8,
    pub default_pos: i32,
    pub max_share: i32,
    pub max_share_clone: Option<CloneId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BargeEl {
    pub clone: CloneId,
    pub offset: i32,
}

/// One token of a barge line: `+(acc`, `-(acc`, `?(acc` or `acc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneEnd {
    Start { clone: CloneId, orientation: i8 },
    End { clone: CloneId },
}

/// Clones known to overlap each other on the map.
#[derive(Debug, Clone)]
pub struct Barge {
    /// 1-based, in file order
    pub id: usize,
    pub clones: Vec<BargeEl>,
    pub ends: Vec<CloneEnd>,
    pub offset: i32,
    pub size: i32,
}

/// Fragments, clones and barges of one contig.
#[derive(Debug, Clone, Default)]
pub struct Contig {
    pub name: String,
    pub frags: Vec<Fragment>,
    pub clones: Vec<CloneInfo>,
    pub barges: Vec<Barge>,
    frag_index: IndexMap<String, FragId>,
    clone_index: IndexMap<String, CloneId>,
    ignored: FxHashSet<String>,
    map_overlaps: FxHashSet<(CloneId, CloneId)>,
    clone_overlaps: FxHashMap<(CloneId, CloneId), i32>,
}

impl Contig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Returns `None` when the accession is already present.
    pub fn add_clone(
        &mut self,
        name: &str,
        map_pos: i32,
        phase: Phase,
        flip_tendency: i32,
    ) -> Option<CloneId> {
        if self.clone_index.contains_key(name) {
            return None;
        }
        let id = self.clones.len();
        self.clones.push(CloneInfo {
            name: name.to_string(),
            map_pos,
            phase,
            flip_tendency,
            size: 0,
            frags: vec![],
            barge: None,
            orientation: 0,
            default_pos: map_pos,
            max_share: 0,
            max_share_clone: None,
        });
        self.clone_index.insert(name.to_string(), id);
        Some(id)
    }

    /// Appends a fragment to its clone. Returns `None` when the name is taken.
    pub fn add_fragment(&mut self, clone: CloneId, name: &str, seq: Vec<u8>) -> Option<FragId> {
        if self.frag_index.contains_key(name) {
            return None;
        }
        let id = self.frags.len();
        let size = seq.len() as i32;
        let c = &mut self.clones[clone];
        self.frags.push(Fragment {
            name: name.to_string(),
            size,
            clone,
            clone_pos: c.size,
            default_pos: c.map_pos + c.size,
            seq,
        });
        c.size += size;
        c.frags.push(id);
        self.frag_index.insert(name.to_string(), id);
        Some(id)
    }

    /// Remembers a fragment that belongs to an excluded clone.
    pub fn ignore_fragment(&mut self, name: &str) {
        self.ignored.insert(name.to_string());
    }

    pub fn frag_id(&self, name: &str) -> Option<FragId> {
        self.frag_index.get(name).copied()
    }

    pub fn clone_id(&self, name: &str) -> Option<CloneId> {
        self.clone_index.get(name).copied()
    }

    /// `Ok(None)` for fragments of excluded clones, an error for names never seen.
    pub fn resolve_frag(&self, name: &str) -> Result<Option<FragId>, AssemblyError> {
        if let Some(id) = self.frag_id(name) {
            Ok(Some(id))
        } else if self.ignored.contains(name) {
            Ok(None)
        } else {
            Err(AssemblyError::UnknownFragment {
                name: name.to_string(),
            })
        }
    }

    pub fn frag_clone(&self, frag: FragId) -> &CloneInfo {
        &self.clones[self.frags[frag].clone]
    }

    pub fn frag_barge(&self, frag: FragId) -> Option<BargeId> {
        self.frag_clone(frag).barge
    }

    /// Registers a barge from its clone end tokens.
    ///
    /// Offsets are map positions relative to the first clone of the line.
    pub fn add_barge(&mut self, ends: Vec<CloneEnd>) -> Result<BargeId, AssemblyError> {
        let id = self.barges.len();
        let mut clones = vec![];
        let mut base = None;
        for end in &ends {
            if let CloneEnd::Start { clone, orientation } = *end {
                let c = &mut self.clones[clone];
                if c.barge.is_some() {
                    return Err(AssemblyError::DuplicateBarge {
                        clone: c.name.clone(),
                    });
                }
                c.barge = Some(id);
                c.orientation = orientation;
                let base = *base.get_or_insert(c.map_pos);
                clones.push(BargeEl {
                    clone,
                    offset: c.map_pos - base,
                });
            }
        }

        for (i, end) in ends.iter().enumerate() {
            if let CloneEnd::Start { clone, .. } = *end {
                self.map_overlaps.insert((clone, clone));
                for other in &ends[i + 1..] {
                    match *other {
                        CloneEnd::End { clone: c } if c == clone => break,
                        CloneEnd::Start { clone: c, .. } | CloneEnd::End { clone: c } => {
                            self.map_overlaps.insert((clone, c));
                            self.map_overlaps.insert((c, clone));
                        }
                    }
                }
            }
        }

        let size = clones
            .iter()
            .map(|el| el.offset + self.clones[el.clone].size)
            .max()
            .unwrap_or(0);
        self.barges.push(Barge {
            id: id + 1,
            clones,
            ends,
            offset: 0,
            size,
        });
        Ok(id)
    }

    /// The clone end order of the map says the two clones overlap.
    pub fn clones_map_overlap(&self, a: CloneId, b: CloneId) -> bool {
        self.map_overlaps.contains(&(a, b))
    }

    pub fn set_clone_overlap(&mut self, a: CloneId, b: CloneId, overlap: i32) {
        self.clone_overlaps.insert((a, b), overlap);
        self.clone_overlaps.insert((b, a), overlap);
        for (x, y) in [(a, b), (b, a)] {
            if overlap > self.clones[x].max_share {
                self.clones[x].max_share = overlap;
                self.clones[x].max_share_clone = Some(y);
            }
        }
    }

    pub fn clone_overlap(&self, a: CloneId, b: CloneId) -> i32 {
        self.clone_overlaps.get(&(a, b)).copied().unwrap_or(0)
    }

    /// Higher is better: finished sequence first, then longer fragments.
    pub fn seq_quality(&self, frag: FragId, scoring: &Scoring) -> i32 {
        let f = &self.frags[frag];
        self.clones[f.clone].phase.code() * scoring.phase_weight
            + f.size.min(scoring.quality_size_cap)
    }

    /// Distance between two clones on the map, 0 when their extents intersect.
    pub fn max_map_dif(&self, a: CloneId, b: CloneId) -> i32 {
        let a = &self.clones[a];
        let b = &self.clones[b];
        let (a_start, a_end) = (a.map_pos, a.map_pos + a.size);
        let (b_start, b_end) = (b.map_pos, b.map_pos + b.size);
        if a_end <= b_start {
            b_start - a_end
        } else if b_end <= a_start {
            a_start - b_end
        } else {
            0
        }
    }

    /// Lays barges out end to end and derives clone and fragment positions.
    ///
    /// `bridged(a, b)` tells whether the barge after `a` is known to follow it.
    pub fn calc_positions<F>(&mut self, bridged: F, cfg: &AssemblyConfig)
    where
        F: Fn(BargeId, BargeId) -> bool,
    {
        let mut offset = 0;
        for i in 0..self.barges.len() {
            self.barges[i].offset = offset;
            offset += self.barges[i].size;
            if i + 1 < self.barges.len() {
                offset += if bridged(i, i + 1) {
                    cfg.bridged_barge_gap
                } else {
                    cfg.unbridged_barge_gap
                };
            }
        }

        for barge in &self.barges {
            for el in &barge.clones {
                let clone = &mut self.clones[el.clone];
                clone.default_pos = barge.offset + el.offset;
                for (i, &f) in clone.frags.iter().enumerate() {
                    self.frags[f].default_pos = clone.default_pos + 10 * i as i32;
                }
            }
        }
    }

    /// Fragments sorted by default position.
    pub fn frags_by_position(&self) -> Vec<FragId> {
        let mut ids: Vec<FragId> = (0..self.frags.len()).collect();
        ids.sort_by_key(|&f| self.frags[f].default_pos);
        ids
    }
}
