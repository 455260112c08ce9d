//! Masked image modeling objectives (MIM and the unimodal UMIM).

use candle_core::Tensor;

use radfuse_core::{Batch, InferRequest, MimHead, Phase, Task};

use crate::context::TaskContext;
use crate::error::ObjectiveResult;
use crate::ops;

/// Result of one masked-image step.
#[derive(Debug, Clone)]
pub struct MimOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Reconstructed patches `[N, L, P]`.
    pub logits: Tensor,
    /// Pixel targets `[N, L, P]` (standardized when configured).
    pub labels: Tensor,
}

/// Masked image modeling over masked image + real text.
pub fn compute_mim(
    ctx: &mut TaskContext<'_>,
    head: &dyn MimHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<MimOutput> {
    masked_image(ctx, head, batch, phase, Task::Mim, false)
}

/// Unimodal MIM: the language modality is replaced by the placeholder
/// embedding so the vision stream trains alone.
pub fn compute_umim(
    ctx: &mut TaskContext<'_>,
    head: &dyn MimHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<MimOutput> {
    masked_image(ctx, head, batch, phase, Task::Umim, true)
}

fn masked_image(
    ctx: &mut TaskContext<'_>,
    head: &dyn MimHead,
    batch: &Batch,
    phase: Phase,
    task: Task,
    pseudo_language: bool,
) -> ObjectiveResult<MimOutput> {
    let request = InferRequest::masked_image().with_pseudo_language(pseudo_language);
    let infer = ctx.encoder.infer(batch, &request)?;

    let image_feats = infer.image_feats_at(ctx.config.mim_layer)?;
    let logits = head.predict(image_feats, infer.mim_ids_restore()?)?;

    let mut target = infer.patched_images()?.clone();
    if ctx.config.norm_pix_loss {
        target = ops::normalize_patches(&target)?;
    }

    let mask = infer.mim_masks()?;
    let loss = ops::masked_patch_mse(&logits, &target, mask)?;

    let loss_value = ctx.metrics.update_loss(phase, task, ops::scalar_f32(&loss)?)?;
    ctx.log(task, phase, "loss", loss_value);
    // Directional signal only: the reconstruction has no discrete notion of
    // correct, so accuracy is reported as the negated loss.
    ctx.log(task, phase, "accuracy", -loss_value);

    Ok(MimOutput { loss, logits, labels: target })
}
