pub mod bridge;
pub mod config;
pub mod diag;
pub mod error;
pub mod evidence;
pub mod golden;
pub mod graph;
pub mod loader;
pub mod model;
pub mod order;
pub mod overlap;
pub mod pipeline;
pub mod raft;
pub mod range;
pub mod report;

pub use config::{AssemblyConfig, Scoring};
pub use diag::{Diagnostics, LogDiagnostics, MemoryDiagnostics, Rejection, Tally};
pub use error::AssemblyError;
pub use model::{Contig, FragId, CloneId, BargeId};
pub use pipeline::{Assembly, AssemblyInput, AssemblyStats};
pub use raft::{RaftId, RaftSet};
