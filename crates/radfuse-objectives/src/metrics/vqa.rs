//! VQA score-weighted accuracy, keyed additionally by answer type.

use std::collections::HashMap;

use candle_core::{DType, Tensor, D};

use crate::error::ObjectiveResult;

/// VQA-standard accuracy: per example, the soft-target score of the argmax
/// answer. Tracks an overall mean plus a per-answer-type breakdown.
#[derive(Debug, Clone, Default)]
pub struct VqaScoreMetric {
    score_sum: f64,
    count: u64,
    by_type: HashMap<u32, (f64, u64)>,
}

impl VqaScoreMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from logits `[N, A]`, soft targets `[N, A]`, and per-example
    /// answer-type categories. Returns the batch mean score.
    pub fn update(
        &mut self,
        logits: &Tensor,
        targets: &Tensor,
        answer_types: &[u32],
    ) -> ObjectiveResult<f32> {
        let preds: Vec<u32> = logits.argmax(D::Minus1)?.to_dtype(DType::U32)?.to_vec1()?;
        let targets: Vec<Vec<f32>> = targets.to_dtype(DType::F32)?.to_vec2()?;

        let mut batch_sum = 0.0f64;
        for (i, (&pred, row)) in preds.iter().zip(targets.iter()).enumerate() {
            let score = row.get(pred as usize).copied().unwrap_or(0.0) as f64;
            batch_sum += score;
            self.score_sum += score;
            self.count += 1;

            if let Some(&answer_type) = answer_types.get(i) {
                let entry = self.by_type.entry(answer_type).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        if preds.is_empty() {
            Ok(0.0)
        } else {
            Ok((batch_sum / preds.len() as f64) as f32)
        }
    }

    /// Overall mean score since the last reset.
    pub fn compute(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.score_sum / self.count as f64) as f32
        }
    }

    /// Mean score for one answer-type category.
    pub fn compute_for_type(&self, answer_type: u32) -> Option<f32> {
        self.by_type
            .get(&answer_type)
            .map(|&(sum, count)| (sum / count as f64) as f32)
    }

    pub fn reset(&mut self) {
        self.score_sum = 0.0;
        self.count = 0;
        self.by_type.clear();
    }
}
