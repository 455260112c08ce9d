//! Masked language modeling objectives (MLM and the unimodal UMLM).

use candle_core::Tensor;

use radfuse_core::{Batch, InferRequest, Phase, Task, TaskHead};

use crate::context::TaskContext;
use crate::error::{ObjectiveError, ObjectiveResult};
use crate::ops;

/// Result of one masked-language step.
#[derive(Debug, Clone)]
pub struct MlmOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Vocabulary logits `[N, T, V]`.
    pub logits: Tensor,
    /// Token labels under masking `[N, T]`.
    pub labels: Tensor,
    /// Token ids as seen by the encoder `[N, T]`.
    pub ids: Tensor,
}

/// Masked language modeling over real image + masked text.
pub fn compute_mlm(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<MlmOutput> {
    masked_language(ctx, head, batch, phase, Task::Mlm, false)
}

/// Unimodal MLM: the vision modality is replaced by the placeholder
/// embedding so the text stream trains alone.
pub fn compute_umlm(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<MlmOutput> {
    masked_language(ctx, head, batch, phase, Task::Umlm, true)
}

fn masked_language(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
    task: Task,
    pseudo_vision: bool,
) -> ObjectiveResult<MlmOutput> {
    let request = InferRequest::masked_text().with_pseudo_vision(pseudo_vision);
    let infer = ctx.encoder.infer(batch, &request)?;

    let logits = head.forward(&infer.multi_modal_text_feats)?;
    let labels = infer.text_labels.clone();

    let (n, t, v) = logits.dims3()?;
    if v != ctx.config.vocab_size {
        return Err(ObjectiveError::InvalidBatch(format!(
            "head vocabulary {v} does not match configured vocab_size {}",
            ctx.config.vocab_size
        )));
    }

    let flat_logits = logits.reshape((n * t, v))?;
    let flat_labels = labels.reshape((n * t,))?;
    let loss =
        ops::cross_entropy_with_ignore(&flat_logits, &flat_labels, ctx.config.ignore_index)?;

    let loss_value = ctx.metrics.update_loss(phase, task, ops::scalar_f32(&loss)?)?;
    let accuracy = ctx.metrics.update_accuracy(
        phase,
        task,
        &flat_logits,
        &flat_labels,
        Some(ctx.config.ignore_index),
    )?;

    ctx.log(task, phase, "loss", loss_value);
    ctx.log(task, phase, "accuracy", accuracy);

    Ok(MlmOutput { loss, logits, labels, ids: infer.text_ids })
}
