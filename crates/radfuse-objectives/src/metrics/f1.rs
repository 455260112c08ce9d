//! Micro-F1 accumulator over post-sigmoid probabilities.

use candle_core::{DType, Tensor};

use crate::error::ObjectiveResult;

/// Decision threshold applied to probabilities.
const THRESHOLD: f32 = 0.5;

/// Micro-averaged F1 over every (example, label) cell.
#[derive(Debug, Clone, Default)]
pub struct F1Metric {
    true_positives: u64,
    false_positives: u64,
    false_negatives: u64,
}

impl F1Metric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from probabilities and binary targets of identical shape.
    pub fn update(&mut self, probs: &Tensor, targets: &Tensor) -> ObjectiveResult<()> {
        let probs: Vec<f32> = probs.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;
        let targets: Vec<f32> = targets.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;

        for (&p, &t) in probs.iter().zip(targets.iter()) {
            let predicted = p >= THRESHOLD;
            let actual = t >= 0.5;
            match (predicted, actual) {
                (true, true) => self.true_positives += 1,
                (true, false) => self.false_positives += 1,
                (false, true) => self.false_negatives += 1,
                (false, false) => {}
            }
        }
        Ok(())
    }

    pub fn precision(&self) -> f32 {
        let denom = self.true_positives + self.false_positives;
        if denom == 0 {
            0.0
        } else {
            self.true_positives as f32 / denom as f32
        }
    }

    pub fn recall(&self) -> f32 {
        let denom = self.true_positives + self.false_negatives;
        if denom == 0 {
            0.0
        } else {
            self.true_positives as f32 / denom as f32
        }
    }

    /// Micro-F1 since the last reset.
    pub fn compute(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn reset(&mut self) {
        self.true_positives = 0;
        self.false_positives = 0;
        self.false_negatives = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_known_counts() {
        let device = Device::Cpu;
        // Predictions at 0.5 threshold: [1, 0, 1, 0]; targets: [1, 1, 0, 0]
        let probs = Tensor::from_slice(&[0.9f32, 0.2, 0.8, 0.1], (4,), &device).unwrap();
        let targets = Tensor::from_slice(&[1.0f32, 1.0, 0.0, 0.0], (4,), &device).unwrap();

        let mut m = F1Metric::new();
        m.update(&probs, &targets).unwrap();

        // tp=1, fp=1, fn=1 -> P = R = 0.5 -> F1 = 0.5
        assert!((m.precision() - 0.5).abs() < 1e-6);
        assert!((m.recall() - 0.5).abs() < 1e-6);
        assert!((m.compute() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_is_zero() {
        let m = F1Metric::new();
        assert_eq!(m.compute(), 0.0);
    }
}
