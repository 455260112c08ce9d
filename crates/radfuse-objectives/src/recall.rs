//! Distributed image-text retrieval recall evaluation.
//!
//! A full-corpus two-pass routine, not a per-batch objective: texts are
//! prefetched in full on every process, images are sharded round-robin by
//! rank, every local image is scored against every text, and the score
//! rows are gathered across processes after a hard barrier. Identity is
//! matched via the stored source-image index, never array position.

use std::collections::HashSet;

use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use tracing::info;

use radfuse_core::{
    Batch, CoreResult, DistributedComm, InferRequest, MultimodalEncoder, TaskHead, TextFields,
};

use crate::error::{ObjectiveError, ObjectiveResult};

/// Recall cutoffs reported in both directions.
const RECALL_KS: [usize; 3] = [1, 5, 10];

/// One prefetched text batch: deduplicated captions with the index of the
/// image each caption describes.
#[derive(Debug, Clone)]
pub struct RetrievalTextBatch {
    pub text: TextFields,
    pub image_index: Vec<i64>,
}

/// One prefetched image: a `[1, C, H, W]` tensor plus its index.
#[derive(Debug, Clone)]
pub struct RetrievalImage {
    pub image: Tensor,
    pub image_index: i64,
}

/// Full-corpus data source for recall evaluation. Ordering must be
/// deterministic across processes; sharding is the evaluator's concern.
pub trait RetrievalSource {
    /// Every deduplicated no-false text batch.
    fn text_batches(&self) -> CoreResult<Vec<RetrievalTextBatch>>;

    /// Every image example, unsharded.
    fn images(&self) -> CoreResult<Vec<RetrievalImage>>;
}

/// Recall@{1,5,10} in both retrieval directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecallSummary {
    /// Text-to-image recall.
    pub ir_r1: f32,
    pub ir_r5: f32,
    pub ir_r10: f32,
    /// Image-to-text recall.
    pub tr_r1: f32,
    pub tr_r5: f32,
    pub tr_r10: f32,
    pub num_images: usize,
    pub num_texts: usize,
}

/// Run the full recall evaluation.
///
/// Requires a pre-established process group; the barrier before gathering
/// is hard, so a stall in any process blocks all of them. The all-gather
/// must preserve per-process ordering so scores and ids stay paired.
pub fn compute_irtr_recall(
    encoder: &dyn MultimodalEncoder,
    head: &dyn TaskHead,
    source: &dyn RetrievalSource,
    comm: &dyn DistributedComm,
) -> ObjectiveResult<RecallSummary> {
    let text_preload = source.text_batches()?;
    let text_image_ids: Vec<i64> = text_preload
        .iter()
        .flat_map(|batch| batch.image_index.iter().copied())
        .collect();
    let num_texts = text_image_ids.len();
    if num_texts == 0 {
        return Err(ObjectiveError::Retrieval("empty text corpus".to_string()));
    }

    // Shard images round-robin by rank; every id lives on exactly one
    // process, so the gathered matrix has no duplicated rows.
    let rank = comm.rank();
    let world_size = comm.world_size();
    let local_images: Vec<RetrievalImage> = source
        .images()?
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| idx % world_size == rank)
        .map(|(_, image)| image)
        .collect();

    info!(
        target: "radfuse::recall",
        rank,
        world_size,
        local_images = local_images.len(),
        num_texts,
        "scoring retrieval corpus"
    );

    let mut local_scores: Vec<f32> = Vec::with_capacity(local_images.len() * num_texts);
    let mut local_ids: Vec<i64> = Vec::with_capacity(local_images.len());

    for image in &local_images {
        for text_batch in &text_preload {
            let batch_len = text_batch.text.ids.dim(0)?;
            let replicated = image.image.repeat((batch_len, 1, 1, 1))?;

            let scoring_batch = Batch {
                text: Some(text_batch.text.clone()),
                ..Default::default()
            };
            let request = InferRequest::unmasked().with_image_override(replicated);
            let infer = encoder.infer(&scoring_batch, &request)?;

            let logits = head.forward(&infer.multi_modal_cls_feats)?;
            let scores: Vec<f32> =
                logits.narrow(1, 0, 1)?.squeeze(1)?.to_vec1()?;
            local_scores.extend_from_slice(&scores);
        }
        local_ids.push(image.image_index);
    }

    comm.barrier()?;
    let gathered_scores = comm.all_gather_f32(&local_scores)?;
    let gathered_ids = comm.all_gather_i64(&local_ids)?;

    let scores: Vec<f32> = gathered_scores.into_iter().flatten().collect();
    let image_ids: Vec<i64> = gathered_ids.into_iter().flatten().collect();

    let num_images = image_ids.len();
    if num_images == 0 || scores.len() != num_images * num_texts {
        return Err(ObjectiveError::Retrieval(format!(
            "gathered {} scores for {} images x {} texts",
            scores.len(),
            num_images,
            num_texts
        )));
    }
    let unique: HashSet<i64> = image_ids.iter().copied().collect();
    if unique.len() != num_images {
        return Err(ObjectiveError::Retrieval(
            "duplicate image ids across shards".to_string(),
        ));
    }

    // Dense [num_images, num_texts] view over the gathered scores.
    let row = |i: usize| &scores[i * num_texts..(i + 1) * num_texts];

    // Image -> text: does some top-K text in row i describe image i?
    let mut text_recall = [0.0f32; 3];
    for (slot, &k) in RECALL_KS.iter().enumerate() {
        let mut hits = 0usize;
        for (i, &image_id) in image_ids.iter().enumerate() {
            let top = top_k_indices(row(i), k);
            if top.iter().any(|&j| text_image_ids[j] == image_id) {
                hits += 1;
            }
        }
        text_recall[slot] = hits as f32 / num_images as f32;
    }

    // Text -> image: does some top-K image in column j match the caption's
    // source image?
    let mut image_recall = [0.0f32; 3];
    for (slot, &k) in RECALL_KS.iter().enumerate() {
        let mut hits = 0usize;
        for (j, &text_image_id) in text_image_ids.iter().enumerate() {
            let column: Vec<f32> = (0..num_images).map(|i| row(i)[j]).collect();
            let top = top_k_indices(&column, k);
            if top.iter().any(|&i| image_ids[i] == text_image_id) {
                hits += 1;
            }
        }
        image_recall[slot] = hits as f32 / num_texts as f32;
    }

    Ok(RecallSummary {
        ir_r1: image_recall[0],
        ir_r5: image_recall[1],
        ir_r10: image_recall[2],
        tr_r1: text_recall[0],
        tr_r5: text_recall[1],
        tr_r10: text_recall[2],
        num_images,
        num_texts,
    })
}

/// Indices of the `k` largest values, ties broken toward the lower index.
fn top_k_indices(values: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}
