//! The AgriVoice question pipeline.
//!
//! [`Pipeline`] runs transcription, advice generation, translation and speech
//! synthesis in order for one request. [`ArtifactStore`] owns the two
//! directories holding recordings and synthesized answers, hands out
//! self-deleting artifact guards, and sweeps files past their retention
//! window.

pub mod artifact;
pub mod error;
pub mod orchestrator;

pub use artifact::{ArtifactStore, InputArtifact, OutputArtifact};
pub use error::PipelineError;
pub use orchestrator::{resolve_target, AudioAnswer, Pipeline};
