//! Radfuse Core Library
//!
//! Domain types and collaborator contracts for the radfuse multi-task
//! vision-language objectives.
//!
//! # Architecture
//!
//! This crate defines:
//! - Phase and task identifiers (`Phase`, `Task`)
//! - The typed training batch (`Batch`, `TextFields`, `VqaFields`)
//! - Encoder inference request/result types (`InferRequest`, `InferOutput`)
//! - Collaborator traits (`MultimodalEncoder`, `TaskHead`, `MimHead`,
//!   `PairHead`, `CaptionDecoder`, `MetricSink`, `DistributedComm`)
//! - Configuration (`ObjectivesConfig`) and error types
//!
//! The compute-heavy objective functions live in `radfuse-objectives`.

pub mod batch;
pub mod config;
pub mod error;
pub mod inference;
pub mod phase;
pub mod traits;

// Re-exports for convenience
pub use batch::{Batch, TextFields, VqaFields};
pub use config::{ObjectivesConfig, IGNORE_INDEX};
pub use error::{CoreError, CoreResult};
pub use inference::{InferOutput, InferRequest};
pub use phase::{Phase, Task};
pub use traits::{
    CaptionDecoder, DistributedComm, LocalComm, MetricSink, MimHead, MultimodalEncoder, NullSink,
    PairHead, TaskHead, TokenizedText, TracingSink,
};
