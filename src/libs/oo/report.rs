//! Text renderings of an assembly.
//!
//! Every writer takes the destination as a plain `Write`, so the CLI can point them at
//! files while tests keep them in memory.

use crate::libs::oo::bridge::BridgeGraph;
use crate::libs::oo::golden::{GoldenPath, Segment};
use crate::libs::oo::graph::{strand_char, GraphNode, NodeKind};
use crate::libs::oo::model::Contig;
use crate::libs::oo::raft::{RaftFrag, RaftId, RaftSet};
use crate::libs::psl;
use itertools::Itertools;
use std::io::{self, Write};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn strand(orientation: i8) -> char {
    if orientation >= 0 {
        '+'
    } else {
        '-'
    }
}

/// AGP-like rows: fragments as `O`, gaps as `N`.
pub fn write_gold<W: Write + ?Sized>(out: &mut W, contig: &Contig, golden: &GoldenPath) -> io::Result<()> {
    let mut pos = 0;
    for (i, segment) in golden.segments.iter().enumerate() {
        let size = segment.size();
        write!(out, "{}\t{}\t{}\t{}\t", contig.name, pos + 1, pos + size, i + 1)?;
        match segment {
            Segment::Fragment(span) => writeln!(
                out,
                "O\t{}\t{}\t{}\t{}",
                contig.frags[span.frag].name,
                span.start + 1,
                span.end,
                strand(span.orientation)
            )?,
            Segment::Gap {
                size,
                gap_type,
                bridged,
            } => writeln!(
                out,
                "N\t{}\t{}\t{}",
                size,
                gap_type.name(),
                if *bridged { "yes" } else { "no" }
            )?,
        }
        pos += size;
    }
    Ok(())
}

/// The golden sequence as one record. Returns the number of bases written.
pub fn write_fasta<W: Write>(out: W, contig: &Contig, golden: &GoldenPath) -> io::Result<usize> {
    let seq = golden.sequence(contig);
    let len = seq.len();
    let mut writer = noodles_fasta::io::writer::Builder::default()
        .set_line_base_count(50)
        .build_from_writer(out);
    let definition = noodles_fasta::record::Definition::new(contig.name.clone(), None);
    let record = noodles_fasta::Record::new(definition, noodles_fasta::record::Sequence::from(seq));
    writer.write_record(&record)?;
    Ok(len)
}

fn placed_frags(rafts: &RaftSet, raft: RaftId) -> Vec<RaftFrag> {
    rafts.rafts[raft]
        .frags
        .iter()
        .copied()
        .sorted_by_key(|rf| rf.offset)
        .collect()
}

/// Fragment layout in contig coordinates: `frag start end strand`.
pub fn write_gl<W: Write + ?Sized>(
    out: &mut W,
    contig: &Contig,
    rafts: &RaftSet,
    golden: &GoldenPath,
) -> io::Result<()> {
    for rp in &golden.raft_paths {
        for rf in placed_frags(rafts, rp.raft) {
            let start = rp.start + rf.offset;
            let frag = &contig.frags[rf.frag];
            writeln!(out, "{} {} {} {}", frag.name, start, start + frag.size, strand(rf.orientation))?;
        }
    }
    Ok(())
}

/// Layout with the graph component (`G`) and raft (`R`) of each fragment.
pub fn write_layout<W: Write + ?Sized>(
    out: &mut W,
    contig: &Contig,
    rafts: &RaftSet,
    bridges: &BridgeGraph,
    golden: &GoldenPath,
) -> io::Result<()> {
    let components = bridges.graph.component_numbers();
    for rp in &golden.raft_paths {
        let raft = &rafts.rafts[rp.raft];
        let node = bridges.raft_node(rp.raft);
        let group = match node {
            Some(n) if bridges.graph.has_value_neighbor(n) => format!("G{}", components[n.index()]),
            _ => " ".to_string(),
        };
        let label = if raft.frags.len() > 1 {
            format!("R{}", raft.id)
        } else {
            " ".to_string()
        };
        for rf in placed_frags(rafts, rp.raft) {
            let start = rp.start + rf.offset;
            let frag = &contig.frags[rf.frag];
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                frag.name,
                start,
                start + frag.size,
                strand(rf.orientation),
                group,
                label
            )?;
        }
    }
    Ok(())
}

pub fn write_rafts<W: Write + ?Sized>(out: &mut W, contig: &Contig, rafts: &RaftSet) -> io::Result<()> {
    let live = rafts.live();
    let rafted: usize = live
        .iter()
        .map(|&r| rafts.rafts[r].frags.len())
        .filter(|&n| n > 1)
        .sum();
    writeln!(
        out,
        "oog version {} found {} rafts ({} of {} frags)\n",
        VERSION,
        live.len(),
        rafted,
        contig.frags.len()
    )?;
    for r in live {
        let raft = &rafts.rafts[r];
        writeln!(
            out,
            "{} raft {} bases {} frags {} default pos",
            raft.id,
            raft.size(),
            raft.frags.len(),
            raft.default_pos
        )?;
        for rf in &raft.frags {
            let frag = &contig.frags[rf.frag];
            writeln!(out, "{} {} {} {}", rf.offset, strand_char(rf.orientation), frag.name, frag.size)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Clones of each barge at their default positions, gaps between barges labelled.
pub fn write_barges<W: Write + ?Sized>(out: &mut W, contig: &Contig, bridges: &BridgeGraph) -> io::Result<()> {
    writeln!(out, "Barge (Connected Clone) File oog Version {}\n", VERSION)?;
    writeln!(out, "start   accession  size overlap maxClone  maxOverlap")?;
    writeln!(out, "{}", "-".repeat(55))?;
    for (i, barge) in contig.barges.iter().enumerate() {
        for (j, el) in barge.clones.iter().enumerate() {
            let clone = &contig.clones[el.clone];
            let overlap = barge
                .clones
                .get(j + 1)
                .map_or(0, |next| contig.clone_overlap(el.clone, next.clone));
            let share = clone
                .max_share_clone
                .map_or("n/a", |c| contig.clones[c].name.as_str());
            writeln!(
                out,
                "{:7} {:<9} {:6} {:6} {:<9} {:6}",
                clone.default_pos, clone.name, clone.size, overlap, share, clone.max_share
            )?;
        }
        if i + 1 < contig.barges.len() {
            if bridges.barges_bridged(i, i + 1) {
                writeln!(out, "----- bridged gap -----")?;
            } else {
                writeln!(out, "----- open gap -----")?;
            }
        }
    }
    Ok(())
}

fn node_orientation(rafts: &RaftSet) -> impl Fn(&GraphNode) -> Option<i8> + '_ {
    move |node: &GraphNode| match node.kind {
        NodeKind::Anchor => Some(1),
        NodeKind::Raft(r) => Some(rafts.rafts[r].orientation),
        _ => None,
    }
}

pub fn write_graph<W: Write + ?Sized>(out: &mut W, bridges: &BridgeGraph, rafts: &RaftSet) -> io::Result<()> {
    writeln!(out, "mRNA/BAC ends graph by oog version {}\n", VERSION)?;
    bridges.graph.write_text(out, node_orientation(rafts))
}

pub fn write_graph_json<W: Write>(out: W, bridges: &BridgeGraph, rafts: &RaftSet) -> anyhow::Result<()> {
    let dump = bridges.graph.to_dump(node_orientation(rafts));
    serde_json::to_writer_pretty(out, &dump)?;
    Ok(())
}

/// Self alignments behind the rafts, once each.
pub fn write_raft_psl<W: Write>(out: &mut W, rafts: &RaftSet) -> io::Result<()> {
    psl::write_header(out)?;
    let used = rafts
        .live()
        .into_iter()
        .flat_map(|r| rafts.rafts[r].edge_refs.iter().copied())
        .sorted()
        .dedup();
    for e in used {
        rafts.edges[e].psl.write_to(out)?;
    }
    Ok(())
}

pub fn write_frag_map<W: Write + ?Sized>(out: &mut W, contig: &Contig) -> io::Result<()> {
    for f in contig.frags_by_position() {
        let frag = &contig.frags[f];
        writeln!(out, "{}\t{}\t{}", frag.name, frag.default_pos, frag.size)?;
    }
    Ok(())
}

/// `order` pairs each raft with the orientation it was placed in.
pub fn write_raft_order<W: Write + ?Sized>(
    out: &mut W,
    order: &[(RaftId, i8)],
    rafts: &RaftSet,
) -> io::Result<()> {
    for &(r, orientation) in order {
        let raft = &rafts.rafts[r];
        writeln!(out, "{} {} defaultPos {}", raft.id, strand(orientation), raft.default_pos)?;
    }
    Ok(())
}
