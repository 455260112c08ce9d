//! Image-text retrieval ranking loss.

use candle_core::{DType, Tensor};

use radfuse_core::{Batch, InferRequest, Phase, Task, TaskHead, TextFields};

use crate::context::TaskContext;
use crate::error::{ObjectiveError, ObjectiveResult};
use crate::ops;

/// Result of one retrieval-ranking step.
#[derive(Debug, Clone)]
pub struct IrtrOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Candidate scores `[N, K+1]`, true caption at column 0.
    pub scores: Tensor,
}

/// Ranking loss over pre-drawn negative captions.
///
/// Each anchor image is scored against its true caption plus the
/// configured `draw_false_text` negatives; the true caption is always
/// placed first, so cross-entropy against index 0 is the ranking target.
pub fn compute_irtr(
    ctx: &mut TaskContext<'_>,
    head: &dyn TaskHead,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<IrtrOutput> {
    let n = batch.len()?;
    let false_len = ctx.config.draw_false_text;
    let text = batch.text()?;

    // Candidate axis: [N, K+1, T] with the true caption at slot 0.
    let mut ids = vec![text.ids.unsqueeze(1)?];
    let mut masks = vec![text.masks.unsqueeze(1)?];
    let mut labels = vec![text.labels.unsqueeze(1)?];
    for k in 0..false_len {
        let false_text = batch.false_text(k)?;
        ids.push(false_text.ids.unsqueeze(1)?);
        masks.push(false_text.masks.unsqueeze(1)?);
        labels.push(false_text.labels.unsqueeze(1)?);
    }
    let ids = Tensor::cat(&ids, 1)?;
    let masks = Tensor::cat(&masks, 1)?;
    let labels = Tensor::cat(&labels, 1)?;

    let (_, candidates, seq_len) = ids.dims3()?;

    // Replicate the anchor image across its candidate set.
    let image = batch.primary_image()?;
    let (_, channels, height, width) = image.dims4()?;
    let images = image
        .unsqueeze(1)?
        .repeat((1, candidates, 1, 1, 1))?
        .reshape((n * candidates, channels, height, width))?;

    let scoring_batch = Batch {
        images: vec![images],
        text: Some(TextFields {
            ids: ids.reshape((n * candidates, seq_len))?,
            masks: masks.reshape((n * candidates, seq_len))?,
            labels: labels.reshape((n * candidates, seq_len))?,
        }),
        ..Default::default()
    };

    let infer = ctx.encoder.infer(&scoring_batch, &InferRequest::unmasked())?;
    let logits = head.forward(&infer.multi_modal_cls_feats)?;
    if logits.dim(0)? != n * candidates {
        return Err(ObjectiveError::InvalidBatch(format!(
            "matching head returned {} rows for {} candidates",
            logits.dim(0)?,
            n * candidates
        )));
    }

    // Match score is the head's first logit column.
    let scores = logits.narrow(1, 0, 1)?.squeeze(1)?.reshape((n, candidates))?;
    let answer = Tensor::zeros((n,), DType::I64, scores.device())?;
    let loss = ops::cross_entropy(&scores, &answer)?;

    let loss_value = ctx.metrics.update_loss(phase, Task::Irtr, ops::scalar_f32(&loss)?)?;
    ctx.log(Task::Irtr, phase, "loss", loss_value);

    Ok(IrtrOutput { loss, scores })
}
