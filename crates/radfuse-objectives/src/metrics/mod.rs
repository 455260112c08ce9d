//! Per-phase, per-task metric accumulators.
//!
//! Every objective updates its phase's accumulators once per batch; the
//! external trainer owns the reset lifecycle at epoch boundaries.

mod auroc;
mod f1;
mod registry;
mod scalar;
mod text;
mod vqa;

pub use auroc::AurocMetric;
pub use f1::F1Metric;
pub use registry::{MetricKind, MetricRegistry, MetricState};
pub use scalar::{AccuracyMetric, MeanMetric};
pub use text::{BleuMetric, CaptionMetric, RougeMetric};
pub use vqa::VqaScoreMetric;
