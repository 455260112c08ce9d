//! Image-text contrastive objective.

use candle_core::Tensor;

use radfuse_core::{Batch, InferRequest, PairHead, Phase, Task};

use crate::context::TaskContext;
use crate::error::ObjectiveResult;
use crate::ops;
use crate::targets;

/// Result of one contrastive step.
#[derive(Debug, Clone)]
pub struct ItcOutput {
    /// Scalar loss tensor (mean of both directions).
    pub loss: Tensor,
    /// Image-to-text logits `[N, N]`.
    pub logits_image: Tensor,
    /// Text-to-image logits `[N, N]`.
    pub logits_text: Tensor,
    /// Diagonal ground-truth indices `[N]`.
    pub labels: Tensor,
}

/// In-batch contrastive matching.
///
/// Runs inference twice: once as a vision-only view (language replaced by
/// the placeholder) and once as a text-only view (vision replaced), then
/// scores all pairs through the bidirectional similarity head with the
/// diagonal as ground truth for both directions.
pub fn compute_itc(
    ctx: &mut TaskContext<'_>,
    head: &dyn PairHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<ItcOutput> {
    let image_view =
        ctx.encoder.infer(batch, &InferRequest::unmasked().with_pseudo_language(true))?;
    let text_view =
        ctx.encoder.infer(batch, &InferRequest::unmasked().with_pseudo_vision(true))?;

    let (logits_image, logits_text) = head.forward(
        &image_view.multi_modal_cls_feats,
        &text_view.multi_modal_cls_feats,
    )?;

    let n = logits_image.dim(0)?;
    let labels = targets::itc_labels(n, logits_image.device())?;

    let loss_image = ops::cross_entropy(&logits_image, &labels)?;
    let loss_text = ops::cross_entropy(&logits_text, &labels)?;
    let loss = loss_image.add(&loss_text)?.affine(0.5, 0.0)?;

    let loss_value = ctx.metrics.update_loss(phase, Task::Itc, ops::scalar_f32(&loss)?)?;
    ctx.log(Task::Itc, phase, "loss", loss_value);
    // Directional signal only, mirroring the masked-image convention.
    ctx.log(Task::Itc, phase, "accuracy", -loss_value);

    Ok(ItcOutput { loss, logits_image, logits_text, labels })
}
