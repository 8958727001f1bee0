//! Timing-aligned re-dubbing: alignment, assembly and the run orchestrator.

pub mod align;
pub mod assemble;
pub mod pipeline;

pub use align::{AlignedSpeech, DurationAligner, SkipReason, StretchDecision, SynthesizedSpeech};
pub use assemble::{DubAssembler, DubbedVideo};
pub use pipeline::{DubPipeline, DubReport, DubRequest};
