//! Classification objectives: single-label CLS and multi-label MLC.

use candle_core::{DType, Tensor};
use candle_nn::ops::sigmoid;

use radfuse_core::{Batch, InferRequest, Phase, Task, TaskHead};

use crate::context::TaskContext;
use crate::error::ObjectiveResult;
use crate::metrics::MetricKind;
use crate::ops;

/// Result of one single-label classification step.
#[derive(Debug, Clone)]
pub struct ClsOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Class logits `[N, C]`.
    pub logits: Tensor,
    /// Class labels `[N]`.
    pub labels: Tensor,
}

/// Result of one multi-label classification step.
#[derive(Debug, Clone)]
pub struct MlcOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Per-label logits `[N, L]`.
    pub logits: Tensor,
    /// Binary label matrix `[N, L]`.
    pub labels: Tensor,
}

/// Unimodal-ablation request shared by both classification variants:
/// `language_only` substitutes pseudo-vision, `vision_only` substitutes
/// pseudo-language. `ObjectivesConfig::validate` guarantees the flags are
/// mutually exclusive.
fn ablation_request(ctx: &TaskContext<'_>) -> InferRequest {
    InferRequest::unmasked()
        .with_pseudo_vision(ctx.config.language_only)
        .with_pseudo_language(ctx.config.vision_only)
}

/// Single-label classification with cross-entropy.
pub fn compute_cls(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<ClsOutput> {
    let request = ablation_request(ctx);
    let infer = ctx.encoder.infer(batch, &request)?;

    let logits = head.forward(&infer.multi_modal_cls_feats)?;
    let labels = batch.cls_labels()?.to_dtype(DType::I64)?;
    let loss = ops::cross_entropy(&logits, &labels)?;

    let loss_value = ctx.metrics.update_loss(phase, Task::Cls, ops::scalar_f32(&loss)?)?;
    let accuracy = ctx.metrics.update_accuracy(phase, Task::Cls, &logits, &labels, None)?;

    ctx.log(Task::Cls, phase, "loss", loss_value);
    ctx.log(Task::Cls, phase, "accuracy", accuracy);

    Ok(ClsOutput { loss, logits, labels })
}

/// Multi-label classification with independent per-label binary
/// cross-entropy. AUROC and F1 accumulate post-sigmoid probabilities,
/// separate from the loss; there is no combined scalar metric.
pub fn compute_mlc(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<MlcOutput> {
    let request = ablation_request(ctx);
    let infer = ctx.encoder.infer(batch, &request)?;

    let logits = head.forward(&infer.multi_modal_cls_feats)?;
    let labels = batch.mlc_labels()?.to_dtype(logits.dtype())?;
    let loss = ops::binary_cross_entropy_with_logits(&logits, &labels)?;

    let loss_value = ctx.metrics.update_loss(phase, Task::Mlc, ops::scalar_f32(&loss)?)?;

    let probs = sigmoid(&logits)?;
    ctx.metrics
        .update_probabilities(phase, Task::Mlc, MetricKind::Auroc, &probs, &labels)?;
    ctx.metrics
        .update_probabilities(phase, Task::Mlc, MetricKind::F1, &probs, &labels)?;

    ctx.log(Task::Mlc, phase, "loss", loss_value);

    Ok(MlcOutput { loss, logits, labels })
}
