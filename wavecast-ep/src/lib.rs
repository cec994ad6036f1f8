//! wavecast-ep - per-category podcast episode producer
//!
//! Turns recently collected text items into finished audio episodes, one
//! independent pipeline per configured category: analysis report, speaker
//! script, sentence-aware segmentation, bounded-concurrency synthesis,
//! assembly and mastering, then best-effort delivery.

pub mod analysis;
pub mod artifacts;
pub mod audio;
pub mod collect;
pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod script;
pub mod synth;

pub use crate::error::{ProviderError, StageError};
pub use crate::pipeline::coordinator::RunCoordinator;
pub use crate::pipeline::{CategoryOutcome, Collaborators, PipelineStage, PipelineState};
