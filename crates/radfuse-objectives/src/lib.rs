//! Multi-task training and evaluation objectives for a vision-language
//! model.
//!
//! One compute routine per task, sitting between the multimodal encoder
//! and the training-loop controller:
//!
//! ```text
//! dispatcher (external) ──> compute_<task>(ctx, heads, batch, phase)
//!                                 │
//!                       ┌─────────┴──────────┐
//!                       │ encoder.infer(...)  │
//!                       │ target builders     │
//!                       │ loss + accumulators │
//!                       │ scalar logging      │
//!                       └─────────┬──────────┘
//!                                 │
//!                           <Task>Output (loss, logits, labels, texts)
//! ```
//!
//! # Modules
//!
//! - [`metrics`]: per-phase per-task accumulators and the explicit registry
//! - [`targets`]: label/target builders (ITM permutation, ITC diagonal,
//!   VQA soft scatter, teacher-forcing shift)
//! - [`mlm`], [`mim`], [`itm`], [`itc`], [`vqa`], [`cls`], [`clm`],
//!   [`irtr`]: objective functions
//! - [`generation`]: beam-search caption decoding
//! - [`recall`]: distributed full-corpus retrieval recall@{1,5,10}

pub mod clm;
pub mod cls;
pub mod context;
pub mod error;
pub mod generation;
pub mod irtr;
pub mod itc;
pub mod itm;
pub mod metrics;
pub mod mim;
pub mod mlm;
pub mod ops;
pub mod recall;
pub mod targets;
pub mod vqa;

// Re-exports for convenience
pub use clm::{compute_clm, ClmOutput, EMPTY_CAPTION_FALLBACK};
pub use cls::{compute_cls, compute_mlc, ClsOutput, MlcOutput};
pub use context::TaskContext;
pub use error::{ObjectiveError, ObjectiveResult};
pub use generation::{beam_search, BeamSearchConfig};
pub use irtr::{compute_irtr, IrtrOutput};
pub use itc::{compute_itc, ItcOutput};
pub use itm::{compute_itm, ItmOutput};
pub use metrics::{MetricKind, MetricRegistry};
pub use mim::{compute_mim, compute_umim, MimOutput};
pub use mlm::{compute_mlm, compute_umlm, MlmOutput};
pub use recall::{
    compute_irtr_recall, RecallSummary, RetrievalImage, RetrievalSource, RetrievalTextBatch,
};
pub use vqa::{compute_vqa, VqaOutput};
