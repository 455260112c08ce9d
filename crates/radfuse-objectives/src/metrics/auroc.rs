//! AUROC accumulator over post-sigmoid probabilities.

use candle_core::{DType, Tensor};

use crate::error::ObjectiveResult;

/// Area under the ROC curve via the Wilcoxon–Mann–Whitney statistic.
///
/// Accumulates flattened (probability, label) pairs across batches; for
/// multi-label inputs every (example, label) cell is one pair. Returns 0.5
/// when only one class has been observed.
#[derive(Debug, Clone, Default)]
pub struct AurocMetric {
    scores: Vec<f32>,
    positives: Vec<bool>,
}

impl AurocMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from probabilities and binary targets of identical shape.
    pub fn update(&mut self, probs: &Tensor, targets: &Tensor) -> ObjectiveResult<()> {
        let probs: Vec<f32> = probs.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;
        let targets: Vec<f32> = targets.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;

        self.scores.extend_from_slice(&probs);
        self.positives.extend(targets.iter().map(|&t| t >= 0.5));
        Ok(())
    }

    /// AUROC over every pair accumulated since the last reset.
    pub fn compute(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.5;
        }

        // Sort by score descending
        let mut pairs: Vec<(f32, bool)> = self
            .scores
            .iter()
            .zip(self.positives.iter())
            .map(|(&s, &p)| (s, p))
            .collect();
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let total_pos = self.positives.iter().filter(|&&p| p).count() as f32;
        let total_neg = self.positives.len() as f32 - total_pos;

        if total_pos == 0.0 || total_neg == 0.0 {
            return 0.5;
        }

        // Wilcoxon-Mann-Whitney statistic
        let mut auc = 0.0f32;
        let mut tp = 0.0f32;

        for (_, is_positive) in &pairs {
            if *is_positive {
                tp += 1.0;
            } else {
                auc += tp;
            }
        }

        auc / (total_pos * total_neg)
    }

    pub fn reset(&mut self) {
        self.scores.clear();
        self.positives.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_perfect_separation() {
        let device = Device::Cpu;
        let probs =
            Tensor::from_slice(&[0.9f32, 0.8, 0.7, 0.3, 0.2, 0.1], (6,), &device).unwrap();
        let targets =
            Tensor::from_slice(&[1.0f32, 1.0, 1.0, 0.0, 0.0, 0.0], (6,), &device).unwrap();

        let mut m = AurocMetric::new();
        m.update(&probs, &targets).unwrap();
        let auc = m.compute();
        assert!((auc - 1.0).abs() < 1e-6, "perfect separation should give 1.0, got {auc}");
    }

    #[test]
    fn test_single_class_is_half() {
        let device = Device::Cpu;
        let probs = Tensor::from_slice(&[0.9f32, 0.1], (2,), &device).unwrap();
        let targets = Tensor::from_slice(&[1.0f32, 1.0], (2,), &device).unwrap();

        let mut m = AurocMetric::new();
        m.update(&probs, &targets).unwrap();
        assert_eq!(m.compute(), 0.5);
    }

    #[test]
    fn test_accumulates_across_batches() {
        let device = Device::Cpu;
        let mut m = AurocMetric::new();
        m.update(
            &Tensor::from_slice(&[0.9f32], (1,), &device).unwrap(),
            &Tensor::from_slice(&[1.0f32], (1,), &device).unwrap(),
        )
        .unwrap();
        m.update(
            &Tensor::from_slice(&[0.1f32], (1,), &device).unwrap(),
            &Tensor::from_slice(&[0.0f32], (1,), &device).unwrap(),
        )
        .unwrap();
        assert!((m.compute() - 1.0).abs() < 1e-6);
    }
}
