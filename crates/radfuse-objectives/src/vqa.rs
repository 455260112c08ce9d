//! Visual question answering objective.

use candle_core::Tensor;

use radfuse_core::{Batch, InferRequest, Phase, Task, TaskHead};

use crate::context::TaskContext;
use crate::error::{ObjectiveError, ObjectiveResult};
use crate::ops;
use crate::targets;

/// Result of one VQA step.
#[derive(Debug, Clone)]
pub struct VqaOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Answer logits `[N, A]`.
    pub logits: Tensor,
    /// Dense soft targets `[N, A]`.
    pub targets: Tensor,
    /// Answer-type category per example.
    pub answer_types: Vec<u32>,
}

/// Soft-label VQA.
///
/// The binary cross-entropy is scaled by the answer-vocabulary size so the
/// loss magnitude matches a per-example multi-hot formulation instead of
/// the with-logits function's per-element mean.
pub fn compute_vqa(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<VqaOutput> {
    let infer = ctx.encoder.infer(batch, &InferRequest::unmasked())?;
    let logits = head.forward(&infer.multi_modal_cls_feats)?;

    let (n, label_size) = logits.dims2()?;
    if label_size != ctx.config.vqa_label_size {
        return Err(ObjectiveError::InvalidBatch(format!(
            "head answer vocabulary {label_size} does not match configured vqa_label_size {}",
            ctx.config.vqa_label_size
        )));
    }
    let vqa = batch.vqa()?;
    let targets = targets::vqa_targets(vqa, n, label_size, logits.device())?;

    let loss = ops::binary_cross_entropy_with_logits(&logits, &targets)?
        .affine(label_size as f64, 0.0)?;

    let loss_value = ctx.metrics.update_loss(phase, Task::Vqa, ops::scalar_f32(&loss)?)?;
    let score = ctx.metrics.update_vqa_score(
        phase,
        Task::Vqa,
        &logits,
        &targets,
        &vqa.answer_types,
    )?;

    ctx.log(Task::Vqa, phase, "loss", loss_value);
    ctx.log(Task::Vqa, phase, "score", score);

    Ok(VqaOutput { loss, logits, targets, answer_types: vqa.answer_types.clone() })
}
