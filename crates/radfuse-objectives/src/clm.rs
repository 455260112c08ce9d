//! Conditional language generation: report captioning with teacher forcing
//! and beam-search decoding outside the training phase.

use candle_core::{DType, Tensor};

use radfuse_core::{Batch, CaptionDecoder, InferRequest, Phase, Task, TaskHead};

use crate::context::TaskContext;
use crate::error::{ObjectiveError, ObjectiveResult};
use crate::generation::{beam_search, BeamSearchConfig};
use crate::metrics::MetricKind;
use crate::ops;
use crate::targets;

/// Substituted for an empty decode so downstream text metrics never see an
/// empty candidate.
pub const EMPTY_CAPTION_FALLBACK: &str = "there is no evidence of pulmonary.";

/// Result of one captioning step.
#[derive(Debug, Clone)]
pub struct ClmOutput {
    /// Scalar loss tensor.
    pub loss: Tensor,
    /// Shifted next-token logits `[N, L-1, V]`.
    pub logits: Tensor,
    /// Shifted target ids `[N, L-1]`.
    pub labels: Tensor,
    /// Decoded captions; present outside the training phase only.
    pub generated: Option<Vec<String>>,
    /// Lower-cased ground-truth reports.
    pub references: Vec<String>,
}

/// Report generation conditioned on the fused multimodal features.
///
/// Image and text features are concatenated along the sequence axis and
/// projected through `proj` before serving as cross-attention context. The
/// target section is findings for a vision-only model, impression
/// otherwise, lower-cased before tokenization.
pub fn compute_clm(
    ctx: &mut TaskContext<'_>,
    proj: &dyn TaskHead,
    decoder: &dyn CaptionDecoder,
    batch: &Batch,
    phase: Phase,
) -> ObjectiveResult<ClmOutput> {
    let request = InferRequest::unmasked()
        .with_pseudo_vision(ctx.config.language_only)
        .with_pseudo_language(ctx.config.vision_only);
    let infer = ctx.encoder.infer(batch, &request)?;

    let states = Tensor::cat(
        &[&infer.multi_modal_image_feats, &infer.multi_modal_text_feats],
        1,
    )?;
    let states = proj.forward(&states)?;

    let raw = if ctx.config.vision_only { &batch.findings } else { &batch.impression };
    if raw.is_empty() {
        return Err(ObjectiveError::InvalidBatch(
            "captioning batch carries no report text".to_string(),
        ));
    }
    let references: Vec<String> = raw.iter().map(|text| text.to_lowercase()).collect();

    let tokens = decoder.tokenize(&references, ctx.config.clm_max_text_len)?;
    let logits = decoder.forward(&tokens.input_ids, Some(&tokens.attention_mask), &states)?;

    let (shifted_logits, shifted_labels) =
        targets::shift_for_next_token(&logits, &tokens.input_ids)?;
    let (n, t, v) = shifted_logits.dims3()?;
    let flat_logits = shifted_logits.reshape((n * t, v))?;
    let flat_labels = shifted_labels.to_dtype(DType::I64)?.reshape((n * t,))?;
    let loss = ops::cross_entropy_with_ignore(
        &flat_logits,
        &flat_labels,
        decoder.pad_token_id() as i64,
    )?;

    let loss_value = ctx.metrics.update_loss(phase, Task::Clm, ops::scalar_f32(&loss)?)?;
    ctx.log(Task::Clm, phase, "loss", loss_value);

    let mut generated = None;
    if phase.is_eval() {
        let config = BeamSearchConfig {
            num_beams: ctx.config.clm_num_beams,
            max_len: ctx.config.clm_max_text_len,
        };
        let sequences = beam_search(decoder, &states, &config)?;
        let mut texts = decoder.detokenize(&sequences)?;
        for text in texts.iter_mut() {
            if text.is_empty() {
                *text = EMPTY_CAPTION_FALLBACK.to_string();
            }
        }

        for kind in [
            MetricKind::Bleu1,
            MetricKind::Bleu2,
            MetricKind::Bleu3,
            MetricKind::Bleu4,
            MetricKind::Rouge,
            MetricKind::Caption,
        ] {
            ctx.metrics.update_texts(phase, Task::Clm, kind, &texts, &references)?;
        }
        generated = Some(texts);
    }

    Ok(ClmOutput {
        loss,
        logits: shifted_logits,
        labels: shifted_labels,
        generated,
        references,
    })
}
