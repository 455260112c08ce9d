//! Scalar accumulators: running loss mean and argmax accuracy.

use candle_core::{DType, Tensor, D};

use crate::error::ObjectiveResult;

/// Running mean of per-batch scalars (loss tracking).
///
/// `update` records one value and returns it unchanged so callers can log
/// the batch-level value; `compute` yields the running mean since the last
/// `reset`.
#[derive(Debug, Clone, Default)]
pub struct MeanMetric {
    sum: f64,
    count: u64,
}

impl MeanMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch value; returns it for logging.
    pub fn update(&mut self, value: f32) -> f32 {
        self.sum += value as f64;
        self.count += 1;
        value
    }

    /// Running mean over all updates since the last reset.
    pub fn compute(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum / self.count as f64) as f32
        }
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

/// Argmax accuracy with an optional ignored label value.
///
/// For masked-token accuracy the ignored value is the no-loss sentinel;
/// ignored positions count toward neither correct nor total.
#[derive(Debug, Clone, Default)]
pub struct AccuracyMetric {
    correct: u64,
    total: u64,
}

impl AccuracyMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from raw logits `[N, C]` and `i64` labels `[N]`.
    ///
    /// Returns the batch accuracy (0.0 for a fully-ignored batch).
    pub fn update(
        &mut self,
        logits: &Tensor,
        targets: &Tensor,
        ignore_index: Option<i64>,
    ) -> ObjectiveResult<f32> {
        let preds = logits.argmax(D::Minus1)?.to_dtype(DType::I64)?;
        let preds: Vec<i64> = preds.to_vec1()?;
        let targets: Vec<i64> = targets.to_dtype(DType::I64)?.to_vec1()?;

        let mut batch_correct = 0u64;
        let mut batch_total = 0u64;
        for (&p, &t) in preds.iter().zip(targets.iter()) {
            if ignore_index == Some(t) {
                continue;
            }
            batch_total += 1;
            if p == t {
                batch_correct += 1;
            }
        }

        self.correct += batch_correct;
        self.total += batch_total;

        if batch_total == 0 {
            Ok(0.0)
        } else {
            Ok(batch_correct as f32 / batch_total as f32)
        }
    }

    /// Running accuracy over all updates since the last reset.
    pub fn compute(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f32 / self.total as f32
        }
    }

    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_mean_metric_running() {
        let mut m = MeanMetric::new();
        assert_eq!(m.update(2.0), 2.0);
        assert_eq!(m.update(4.0), 4.0);
        assert!((m.compute() - 3.0).abs() < 1e-6);
        m.reset();
        assert_eq!(m.compute(), 0.0);
    }

    #[test]
    fn test_accuracy_with_ignore() {
        let device = Device::Cpu;
        let logits = Tensor::from_slice(
            &[0.9f32, 0.1, 0.2, 0.8, 0.7, 0.3],
            (3, 2),
            &device,
        )
        .unwrap();
        let targets = Tensor::from_slice(&[0i64, 1, -100], (3,), &device).unwrap();

        let mut m = AccuracyMetric::new();
        let batch = m.update(&logits, &targets, Some(-100)).unwrap();

        // Both non-ignored positions are correct; the ignored one is skipped.
        assert!((batch - 1.0).abs() < 1e-6);
        assert!((m.compute() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_accuracy_all_ignored() {
        let device = Device::Cpu;
        let logits = Tensor::from_slice(&[0.9f32, 0.1], (1, 2), &device).unwrap();
        let targets = Tensor::from_slice(&[-100i64], (1,), &device).unwrap();

        let mut m = AccuracyMetric::new();
        let batch = m.update(&logits, &targets, Some(-100)).unwrap();
        assert_eq!(batch, 0.0);
        assert_eq!(m.compute(), 0.0);
    }
}
