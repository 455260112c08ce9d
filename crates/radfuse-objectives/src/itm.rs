//! Image-text matching objective.

use candle_core::{DType, Tensor};
use rand::Rng;

use radfuse_core::{Batch, InferRequest, Phase, Task, TaskHead};

use crate::context::TaskContext;
use crate::error::ObjectiveResult;
use crate::ops;
use crate::targets;

/// Result of one matching step.
#[derive(Debug, Clone)]
pub struct ItmOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Match/no-match logits `[N, 2]`.
    pub logits: Tensor,
    /// Matching labels `[N]` after permutation.
    pub labels: Tensor,
}

/// Image-text matching: half the batch keeps its true image, half gets the
/// pre-drawn false image, under one random label permutation.
///
/// The caller supplies the RNG so evaluation runs can be seeded.
pub fn compute_itm<R: Rng + ?Sized>(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
    rng: &mut R,
) -> ObjectiveResult<ItmOutput> {
    let n = batch.len()?;

    // Permute the labels, then select images off the permuted labels so
    // chosen image and label agree bit-for-bit.
    let label_values = targets::itm_labels(n, rng);
    let images = targets::select_itm_images(batch, &label_values)?;
    let paired = batch.clone().with_images(images);

    let infer = ctx.encoder.infer(&paired, &InferRequest::unmasked())?;
    let logits = head.forward(&infer.multi_modal_cls_feats)?;

    let labels = Tensor::from_vec(label_values, (n,), logits.device())?.to_dtype(DType::I64)?;
    let loss = ops::cross_entropy(&logits, &labels)?;

    let loss_value = ctx.metrics.update_loss(phase, Task::Itm, ops::scalar_f32(&loss)?)?;
    let accuracy = ctx.metrics.update_accuracy(phase, Task::Itm, &logits, &labels, None)?;

    ctx.log(Task::Itm, phase, "loss", loss_value);
    ctx.log(Task::Itm, phase, "accuracy", accuracy);

    Ok(ItmOutput { loss, logits, labels })
}
