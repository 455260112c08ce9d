//! Label and target builders.
//!
//! Each builder turns raw batch fields into the loss-ready form its
//! objective consumes. The ITM builder couples the label permutation to
//! image selection: labels are permuted first and images are then indexed
//! off the permuted labels, so chosen image and label always agree.

use candle_core::{Device, IndexOp, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;

use radfuse_core::{Batch, VqaFields};

use crate::error::{ObjectiveError, ObjectiveResult};

/// Matching labels for a batch of `n` pairs: exactly `ceil(n/2)` ones and
/// `floor(n/2)` zeros, in one randomly permuted order.
pub fn itm_labels<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<u32> {
    let positives = n.div_ceil(2);
    let mut labels = vec![1u32; positives];
    labels.resize(n, 0);
    labels.shuffle(rng);
    labels
}

/// Select per-example images according to permuted matching labels: the
/// true image where `labels[i] == 1`, the first false image otherwise.
/// Applied per augmentation view.
pub fn select_itm_images(batch: &Batch, labels: &[u32]) -> ObjectiveResult<Vec<Tensor>> {
    let false_views = batch.false_image(0)?;
    if false_views.len() != batch.images.len() {
        return Err(ObjectiveError::InvalidBatch(format!(
            "false image views ({}) do not match true image views ({})",
            false_views.len(),
            batch.images.len()
        )));
    }

    let mut views = Vec::with_capacity(batch.images.len());
    for (true_view, false_view) in batch.images.iter().zip(false_views.iter()) {
        let mut rows = Vec::with_capacity(labels.len());
        for (i, &label) in labels.iter().enumerate() {
            let row = if label == 1 { true_view.i(i)? } else { false_view.i(i)? };
            rows.push(row);
        }
        views.push(Tensor::stack(&rows, 0)?);
    }
    Ok(views)
}

/// Contrastive ground truth: the identity index sequence `0..n`, the same
/// for both similarity directions.
pub fn itc_labels(n: usize, device: &Device) -> ObjectiveResult<Tensor> {
    Ok(Tensor::arange(0i64, n as i64, device)?)
}

/// Dense soft-label VQA target matrix `[n, label_size]`.
///
/// Scattering uses assignment semantics: when one example repeats an
/// answer index, the later score overwrites the earlier one.
pub fn vqa_targets(
    vqa: &VqaFields,
    n: usize,
    label_size: usize,
    device: &Device,
) -> ObjectiveResult<Tensor> {
    if vqa.labels.len() != n || vqa.scores.len() != n {
        return Err(ObjectiveError::InvalidBatch(format!(
            "vqa supervision rows ({}/{}) do not match batch size {}",
            vqa.labels.len(),
            vqa.scores.len(),
            n
        )));
    }

    let mut targets = vec![0f32; n * label_size];
    for (i, (labels, scores)) in vqa.labels.iter().zip(vqa.scores.iter()).enumerate() {
        for (&label, &score) in labels.iter().zip(scores.iter()) {
            let label = label as usize;
            if label >= label_size {
                return Err(ObjectiveError::InvalidBatch(format!(
                    "vqa answer index {label} out of range (label_size {label_size})"
                )));
            }
            targets[i * label_size + label] = score;
        }
    }

    Ok(Tensor::from_vec(targets, (n, label_size), device)?)
}

/// Teacher-forcing shift: logits over positions `[0, L-2]`, labels from
/// positions `[1, L-1]` of the input ids.
pub fn shift_for_next_token(
    logits: &Tensor,
    input_ids: &Tensor,
) -> ObjectiveResult<(Tensor, Tensor)> {
    let (_, t, _) = logits.dims3()?;
    let shifted_logits = logits.narrow(1, 0, t - 1)?;
    let shifted_labels = input_ids.narrow(1, 1, t - 1)?;
    Ok((shifted_logits, shifted_labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_itm_label_split_counts() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for n in [1usize, 2, 5, 8, 33] {
            let labels = itm_labels(n, &mut rng);
            let ones = labels.iter().filter(|&&l| l == 1).count();
            assert_eq!(ones, n.div_ceil(2), "n = {n}");
            assert_eq!(labels.len(), n);
        }
    }

    #[test]
    fn test_itm_selection_follows_labels() {
        let device = Device::Cpu;
        let n = 4;
        // True images are all ones, false images all zeros, so the selected
        // rows reveal which source was picked.
        let true_view = Tensor::ones((n, 1, 2, 2), DType::F32, &device).unwrap();
        let false_view = Tensor::zeros((n, 1, 2, 2), DType::F32, &device).unwrap();
        let batch = Batch {
            images: vec![true_view],
            false_images: vec![vec![false_view]],
            ..Default::default()
        };

        for seed in 0..16 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let labels = itm_labels(n, &mut rng);
            let selected = select_itm_images(&batch, &labels).unwrap();
            let sums: Vec<f32> = selected[0]
                .sum((1, 2, 3))
                .unwrap()
                .to_vec1()
                .unwrap();
            for (i, &label) in labels.iter().enumerate() {
                let expected = if label == 1 { 4.0 } else { 0.0 };
                assert_eq!(sums[i], expected, "seed {seed}, index {i}");
            }
        }
    }

    #[test]
    fn test_itc_labels_identity() {
        let labels = itc_labels(5, &Device::Cpu).unwrap();
        let values: Vec<i64> = labels.to_vec1().unwrap();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_vqa_targets_scatter() {
        let device = Device::Cpu;
        let vqa = VqaFields {
            labels: vec![vec![1, 3], vec![0]],
            scores: vec![vec![0.3, 0.9], vec![1.0]],
            answer_types: vec![0, 1],
        };
        let targets = vqa_targets(&vqa, 2, 4, &device).unwrap();
        let rows: Vec<Vec<f32>> = targets.to_vec2().unwrap();
        assert_eq!(rows[0], vec![0.0, 0.3, 0.0, 0.9]);
        assert_eq!(rows[1], vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_vqa_targets_overwrite_not_additive() {
        let device = Device::Cpu;
        // The same answer index twice for one example: the later score wins.
        let vqa = VqaFields {
            labels: vec![vec![2, 2]],
            scores: vec![vec![0.3, 0.6]],
            answer_types: vec![0],
        };
        let targets = vqa_targets(&vqa, 1, 3, &device).unwrap();
        let rows: Vec<Vec<f32>> = targets.to_vec2().unwrap();
        assert_eq!(rows[0][2], 0.6);
    }

    #[test]
    fn test_vqa_targets_out_of_range_rejected() {
        let vqa = VqaFields {
            labels: vec![vec![5]],
            scores: vec![vec![1.0]],
            answer_types: vec![0],
        };
        assert!(vqa_targets(&vqa, 1, 3, &Device::Cpu).is_err());
    }

    #[test]
    fn test_shift_positions() {
        let device = Device::Cpu;
        // L = 3, V = 2
        let logits = Tensor::from_slice(
            &[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0],
            (1, 3, 2),
            &device,
        )
        .unwrap();
        let ids = Tensor::from_slice(&[10u32, 11, 12], (1, 3), &device).unwrap();

        let (shifted_logits, shifted_labels) = shift_for_next_token(&logits, &ids).unwrap();
        assert_eq!(shifted_logits.dims(), &[1, 2, 2]);
        let labels: Vec<Vec<u32>> = shifted_labels.to_vec2().unwrap();
        assert_eq!(labels[0], vec![11, 12]);

        let first: Vec<Vec<f32>> = shifted_logits.i(0).unwrap().to_vec2().unwrap();
        assert_eq!(first[0], vec![0.0, 1.0]);
        assert_eq!(first[1], vec![2.0, 3.0]);
    }
}
