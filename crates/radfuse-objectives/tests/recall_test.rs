//! Retrieval recall evaluation over a toy corpus.

use std::collections::HashMap;

use candle_core::{DType, Device, Tensor};

use radfuse_core::{
    Batch, CoreError, CoreResult, InferOutput, InferRequest, LocalComm, MultimodalEncoder,
    TaskHead, TextFields,
};
use radfuse_objectives::{
    compute_irtr_recall, RetrievalImage, RetrievalSource, RetrievalTextBatch,
};

fn device() -> Device {
    Device::Cpu
}

/// Encoder that scores an image/text pair by identity of their fill
/// values: the pooled match logit is 5 when they agree and non-positive
/// otherwise. `uniform` switches to a constant score for every pair.
struct ScoringEncoder {
    uniform: bool,
}

impl MultimodalEncoder for ScoringEncoder {
    fn infer(&self, batch: &Batch, request: &InferRequest) -> CoreResult<InferOutput> {
        let image = request
            .image_override
            .as_ref()
            .ok_or(CoreError::MissingField { field: "image_override" })?;
        let text = batch.text()?;

        let n = image.dim(0)?;
        let score = if self.uniform {
            Tensor::ones((n,), DType::F32, image.device())?
        } else {
            let image_value = image.mean((1, 2, 3))?;
            let text_value = text.ids.to_dtype(DType::F32)?.mean(1)?;
            image_value.sub(&text_value)?.abs()?.affine(-5.0, 5.0)?
        };
        let zeros = score.zeros_like()?;
        let cls_feats = Tensor::stack(&[&score, &zeros], 1)?;

        let placeholder = Tensor::zeros((n, 1, 2), DType::F32, image.device())?;
        Ok(InferOutput {
            multi_modal_text_feats: placeholder.clone(),
            multi_modal_image_feats: placeholder,
            image_feats_by_layer: HashMap::new(),
            multi_modal_cls_feats: cls_feats,
            mim_masks: None,
            mim_ids_restore: None,
            patched_images: None,
            text_labels: text.labels.clone(),
            text_ids: text.ids.clone(),
        })
    }
}

struct PassthroughHead;

impl TaskHead for PassthroughHead {
    fn forward(&self, feats: &Tensor) -> CoreResult<Tensor> {
        Ok(feats.clone())
    }
}

/// Three images with ids 0..3 and one caption per image, captions carried
/// in a single prefetched batch.
struct ToyCorpus {
    image_ids: Vec<i64>,
}

impl RetrievalSource for ToyCorpus {
    fn text_batches(&self) -> CoreResult<Vec<RetrievalTextBatch>> {
        let device = device();
        let n = 3usize;
        let mut ids = Vec::new();
        for j in 0..n {
            ids.extend([j as u32, j as u32]);
        }
        let text = TextFields {
            ids: Tensor::from_vec(ids, (n, 2), &device)?,
            masks: Tensor::ones((n, 2), DType::U32, &device)?,
            labels: Tensor::full(-100i64, (n, 2), &device)?,
        };
        Ok(vec![RetrievalTextBatch { text, image_index: vec![0, 1, 2] }])
    }

    fn images(&self) -> CoreResult<Vec<RetrievalImage>> {
        let device = device();
        self.image_ids
            .iter()
            .map(|&id| {
                let image = Tensor::full(id as f32, (1, 1, 2, 2), &device)?;
                Ok(RetrievalImage { image, image_index: id })
            })
            .collect()
    }
}

#[test]
fn test_perfect_scores_give_full_recall() {
    let encoder = ScoringEncoder { uniform: false };
    let corpus = ToyCorpus { image_ids: vec![0, 1, 2] };

    let summary =
        compute_irtr_recall(&encoder, &PassthroughHead, &corpus, &LocalComm).unwrap();

    assert_eq!(summary.num_images, 3);
    assert_eq!(summary.num_texts, 3);
    for recall in [
        summary.ir_r1,
        summary.ir_r5,
        summary.ir_r10,
        summary.tr_r1,
        summary.tr_r5,
        summary.tr_r10,
    ] {
        assert!((recall - 1.0).abs() < 1e-6, "expected 1.0, got {recall}");
    }
}

#[test]
fn test_uniform_scores_degrade_recall() {
    let encoder = ScoringEncoder { uniform: true };
    let corpus = ToyCorpus { image_ids: vec![0, 1, 2] };

    let summary =
        compute_irtr_recall(&encoder, &PassthroughHead, &corpus, &LocalComm).unwrap();

    // With constant scores only one of three candidates can sit at rank 1.
    assert!((summary.tr_r1 - 1.0 / 3.0).abs() < 1e-6);
    assert!((summary.ir_r1 - 1.0 / 3.0).abs() < 1e-6);
    // Every candidate fits inside the top-5 cutoff of a 3-item corpus.
    assert!((summary.tr_r5 - 1.0).abs() < 1e-6);
    assert!((summary.ir_r5 - 1.0).abs() < 1e-6);
}

#[test]
fn test_duplicate_image_ids_rejected() {
    let encoder = ScoringEncoder { uniform: false };
    let corpus = ToyCorpus { image_ids: vec![0, 1, 1] };

    let err = compute_irtr_recall(&encoder, &PassthroughHead, &corpus, &LocalComm)
        .unwrap_err();
    assert!(err.to_string().contains("duplicate image ids"));
}

#[test]
fn test_summary_serializes() {
    let encoder = ScoringEncoder { uniform: false };
    let corpus = ToyCorpus { image_ids: vec![0, 1, 2] };

    let summary =
        compute_irtr_recall(&encoder, &PassthroughHead, &corpus, &LocalComm).unwrap();
    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("\"ir_r1\":1.0"));
    assert!(json.contains("\"num_texts\":3"));
}
