use serde::{Deserialize, Serialize};

/// Upper bound for unconstrained distances.
pub const BIGNUM: i32 = 0x3fffffff;

/// Range carried by dummy and hint edges.
pub const DUMMY_MAX: i32 = BIGNUM / 10;

/// Numeric thresholds of the assembler.
///
/// Every field has a default, so a JSON file only needs to mention what it overrides:
///
/// ```
/// use oog::libs::oo::AssemblyConfig;
/// let cfg: AssemblyConfig = serde_json::from_str(r#"{"max_tail_size": 500}"#).unwrap();
/// assert_eq!(cfg.max_tail_size, 500);
/// assert_eq!(cfg.min_score, -500);
/// assert_eq!(cfg.scoring.big_block, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Unaligned bases tolerated at either end of an overlap
    pub max_tail_size: i32,
    /// Overlap edges scoring below this are dropped
    pub min_score: i32,
    /// End pairs whose weaker end scores below this are dropped
    pub min_end_pair_score: i32,
    /// Largest map distance between the clones of a pair
    pub max_map_deviation: i32,
    /// Map distance a pair may span without penalty
    pub free_map_deviation: i32,
    pub bridged_barge_gap: i32,
    pub unbridged_barge_gap: i32,
    pub frag_gap: i32,
    pub min_frag_size: i32,
    /// Rafts whose flip tendency exceeds this get a map hint
    pub big_raft_tendency: i32,
    /// How often one overlap edge may step aside for a better socket
    pub max_requeue: usize,
    pub transcript_max_distance: i32,
    pub end_pair_min: i32,
    pub end_pair_max: i32,
    pub estimated_read_size: i32,
    pub scoring: Scoring,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_tail_size: 2000,
            min_score: -500,
            min_end_pair_score: -720,
            max_map_deviation: 600000,
            free_map_deviation: 200000,
            bridged_barge_gap: 50000,
            unbridged_barge_gap: 100000,
            frag_gap: 100,
            min_frag_size: 1,
            big_raft_tendency: 400000,
            max_requeue: 10,
            transcript_max_distance: 500000,
            end_pair_min: 40000,
            end_pair_max: 400000,
            estimated_read_size: 700,
            scoring: Scoring::default(),
        }
    }
}

/// Weights of the alignment and evidence scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scoring {
    // overlap edges
    pub edge_milli_bad_weight: i32,
    pub match_log_weight: f64,
    pub enclose_slop: i32,
    pub low_match_count: i32,
    pub low_match_penalty: i32,
    pub small_frag_size: i32,
    pub small_frag_divisor: i32,

    // raft building
    pub better_edge_window: i32,
    pub extend_slack: usize,
    pub merge_diag_slop: i32,
    pub merge_slack: usize,

    // transcripts
    pub transcript_milli_bad_weight: f64,
    pub transcript_low_match: i32,
    pub transcript_link_penalty: i32,
    pub transcript_reject_below: i32,
    pub transcript_keep_within: i32,
    pub mrna_adjust: i32,
    pub est_adjust: i32,

    // read and end pairs
    pub end_milli_bad_weight: f64,
    pub end_tail_weight: f64,
    pub end_pair_adjust: i32,
    pub map_dif_divisor: i32,

    // bridging and ordering
    pub min_gap_fraction: f64,
    pub flip_distance_weight: i64,
    pub phase_weight: i32,
    pub quality_size_cap: i32,

    // crossovers
    pub big_block: u32,
    pub cross_margin: u32,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            edge_milli_bad_weight: 30,
            match_log_weight: 25.0,
            enclose_slop: 300,
            low_match_count: 20,
            low_match_penalty: 25,
            small_frag_size: 5000,
            small_frag_divisor: 40,

            better_edge_window: 100,
            extend_slack: 10,
            merge_diag_slop: 10,
            merge_slack: 16,

            transcript_milli_bad_weight: 10.0,
            transcript_low_match: 10,
            transcript_link_penalty: 10,
            transcript_reject_below: -100,
            transcript_keep_within: 500,
            mrna_adjust: 25,
            est_adjust: -25,

            end_milli_bad_weight: 20.0,
            end_tail_weight: 4.0,
            end_pair_adjust: -50,
            map_dif_divisor: 1500,

            min_gap_fraction: 0.47,
            flip_distance_weight: 4,
            phase_weight: 50000,
            quality_size_cap: 200000,

            big_block: 20,
            cross_margin: 250,
        }
    }
}

impl AssemblyConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let cfg: AssemblyConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects settings the assembler cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_tail_size < 0 {
            return Err(anyhow::anyhow!("max_tail_size must not be negative"));
        }
        if self.end_pair_min > self.end_pair_max {
            return Err(anyhow::anyhow!("end_pair_min exceeds end_pair_max"));
        }
        Ok(())
    }
}
