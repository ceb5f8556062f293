//! Consensus sequences from one or two Sanger sequencing traces.
//!
//! [`ConsensusBuilder`] aligns a forward and a reverse trace (or takes a
//! single trace as is), calls one base per alignment column and trims poor
//! ends. [`EditableConsensus`] adds hand edits with unlimited undo/redo.
//! Both read their parameters from a shared [`ConsensusSettings`].

pub mod base_probability;
pub mod consensus_builder;
pub mod consensus_settings;
pub mod consensus_trim;
pub mod editable_consensus;
pub mod error;
pub mod observable;
pub mod pairwise_alignment;
pub mod sequence_trace;

pub use consensus_builder::{ConsensusBuilder, ConsensusMode};
pub use consensus_settings::{ConsensusAlgorithm, ConsensusSettings, SettingsSnapshot};
pub use editable_consensus::{EditRange, EditRecord, EditableConsensus};
pub use error::{ConsensusError, Result};
pub use observable::{EventChannel, SubscriptionId, ValueChange};
pub use pairwise_alignment::{OverlapAligner, PairwiseAlignment, SequenceAligner};
pub use sequence_trace::{BasicTrace, SequenceTrace};
