//! Loss primitives shared by the objective functions.
//!
//! All formulations are numerically stable: cross-entropy goes through a
//! shifted log-softmax and the binary variant uses the log-sum-exp form.

use candle_core::{DType, Tensor, D};
use candle_nn::ops::log_softmax;

use crate::error::ObjectiveResult;

/// Cross-entropy over rows of raw logits `[N, C]` with integer labels `[N]`.
///
/// Returns a scalar tensor containing the mean over the batch.
pub fn cross_entropy(logits: &Tensor, targets: &Tensor) -> ObjectiveResult<Tensor> {
    let log_probs = log_softmax(logits, D::Minus1)?;
    let gathered = log_probs.gather(&targets.unsqueeze(1)?, 1)?.squeeze(1)?;
    Ok(gathered.mean_all()?.neg()?)
}

/// Cross-entropy with an ignored label value.
///
/// * `logits` - `[N, C]` raw logits.
/// * `targets` - `[N]` `i64` labels in `[0, C)` or equal to `ignore_index`.
///
/// Positions labeled `ignore_index` contribute nothing to the loss; the
/// mean is taken over the remaining positions. If every position is
/// ignored the loss is `0.0` rather than NaN.
pub fn cross_entropy_with_ignore(
    logits: &Tensor,
    targets: &Tensor,
    ignore_index: i64,
) -> ObjectiveResult<Tensor> {
    let log_probs = log_softmax(logits, D::Minus1)?;

    // Mask before gather so an out-of-range ignore_index stays safe.
    let keep_mask = targets.ne(ignore_index)?;
    let zeros = targets.zeros_like()?;
    let targets_safe = keep_mask.where_cond(targets, &zeros)?;

    let gathered = log_probs.gather(&targets_safe.unsqueeze(1)?, 1)?.squeeze(1)?;

    let mask_float = keep_mask.to_dtype(log_probs.dtype())?;
    let masked = gathered.mul(&mask_float)?;

    let count = mask_float.sum_all()?.to_dtype(DType::F64)?.to_scalar::<f64>()?;
    if count == 0.0 {
        return Ok(Tensor::zeros((), log_probs.dtype(), logits.device())?);
    }

    Ok(masked.sum_all()?.affine(-1.0 / count, 0.0)?)
}

/// Binary cross-entropy with logits against (possibly soft) targets.
///
/// Element-wise `max(x, 0) - x * z + ln(1 + exp(-|x|))`, averaged over all
/// elements - matching the with-logits formulation's default per-element
/// mean.
pub fn binary_cross_entropy_with_logits(
    logits: &Tensor,
    targets: &Tensor,
) -> ObjectiveResult<Tensor> {
    let max_part = logits.relu()?;
    let prod = logits.mul(targets)?;
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    Ok(max_part.sub(&prod)?.add(&softplus)?.mean_all()?)
}

/// Patch-reconstruction loss restricted to removed patches.
///
/// * `pred`, `target` - `[N, L, P]`.
/// * `mask` - `[N, L]`, 1 on removed patches.
///
/// The average is asymmetric: mean over the feature axis first, then a
/// mask-weighted mean over the patch axis, so unmasked patches carry no
/// weight at all.
pub fn masked_patch_mse(pred: &Tensor, target: &Tensor, mask: &Tensor) -> ObjectiveResult<Tensor> {
    let per_patch = pred.sub(target)?.sqr()?.mean(D::Minus1)?;
    let mask = mask.to_dtype(per_patch.dtype())?;
    let weighted = per_patch.mul(&mask)?.sum_all()?;
    let denom = mask.sum_all()?;
    Ok(weighted.div(&denom)?)
}

/// Standardize each target patch independently: zero mean, unit variance,
/// with a numerical floor added before the square root.
///
/// Uses the unbiased variance over the feature axis.
pub fn normalize_patches(target: &Tensor) -> ObjectiveResult<Tensor> {
    let feat_dim = target.dim(D::Minus1)? as f64;
    let mean = target.mean_keepdim(D::Minus1)?;
    let centered = target.broadcast_sub(&mean)?;
    let var = centered
        .sqr()?
        .sum_keepdim(D::Minus1)?
        .affine(1.0 / (feat_dim - 1.0), 0.0)?;
    let denom = var.affine(1.0, 1e-6)?.sqrt()?;
    Ok(centered.broadcast_div(&denom)?)
}

/// Extract a scalar f32 from a 0-dim or 1-element tensor.
pub fn scalar_f32(t: &Tensor) -> ObjectiveResult<f32> {
    let flat = t.to_dtype(DType::F32)?.flatten_all()?;
    Ok(flat.to_vec1::<f32>()?[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn device() -> Device {
        Device::Cpu
    }

    #[test]
    fn test_cross_entropy_matches_manual() {
        let logits = Tensor::from_slice(&[2.0f32, 0.0, 0.0, 0.0, 2.0, 0.0], (2, 3), &device()).unwrap();
        let targets = Tensor::from_slice(&[0i64, 1], (2,), &device()).unwrap();

        let loss = scalar_f32(&cross_entropy(&logits, &targets).unwrap()).unwrap();

        // -log(softmax) at the correct class, identical rows by symmetry.
        let z = (2.0f32).exp() + 1.0 + 1.0;
        let expected = -((2.0f32).exp() / z).ln();
        assert!((loss - expected).abs() < 1e-5, "got {loss}, want {expected}");
    }

    #[test]
    fn test_ignore_index_excluded() {
        let logits =
            Tensor::from_slice(&[2.0f32, 0.0, 0.0, 5.0, 0.0, 0.0], (2, 3), &device()).unwrap();
        let targets_full = Tensor::from_slice(&[0i64, 0], (2,), &device()).unwrap();
        let targets_ignored = Tensor::from_slice(&[0i64, -100], (2,), &device()).unwrap();

        let full = scalar_f32(&cross_entropy_with_ignore(&logits, &targets_full, -100).unwrap())
            .unwrap();
        let partial =
            scalar_f32(&cross_entropy_with_ignore(&logits, &targets_ignored, -100).unwrap())
                .unwrap();

        // Dropping the second (easier) row must change the mean.
        assert!((full - partial).abs() > 1e-6);

        // The partial loss equals the first row's loss alone.
        let z = (2.0f32).exp() + 2.0;
        let expected = -((2.0f32).exp() / z).ln();
        assert!((partial - expected).abs() < 1e-5);
    }

    #[test]
    fn test_all_ignored_is_zero() {
        let logits = Tensor::from_slice(&[1.0f32, 2.0], (1, 2), &device()).unwrap();
        let targets = Tensor::from_slice(&[-100i64], (1,), &device()).unwrap();
        let loss = scalar_f32(&cross_entropy_with_ignore(&logits, &targets, -100).unwrap()).unwrap();
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn test_bce_with_logits_known_value() {
        let logits = Tensor::from_slice(&[0.0f32], (1, 1), &device()).unwrap();
        let targets = Tensor::from_slice(&[1.0f32], (1, 1), &device()).unwrap();
        let loss = scalar_f32(&binary_cross_entropy_with_logits(&logits, &targets).unwrap()).unwrap();
        // -log(sigmoid(0)) = ln 2
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-6);
    }

    #[test]
    fn test_masked_patch_mse_restricted_to_mask() {
        // Two patches: pred differs from target only on patch 1.
        let pred =
            Tensor::from_slice(&[0.0f32, 0.0, 1.0, 1.0], (1, 2, 2), &device()).unwrap();
        let target = Tensor::zeros((1, 2, 2), DType::F32, &device()).unwrap();

        let all = Tensor::from_slice(&[1.0f32, 1.0], (1, 2), &device()).unwrap();
        let only_clean = Tensor::from_slice(&[1.0f32, 0.0], (1, 2), &device()).unwrap();
        let only_dirty = Tensor::from_slice(&[0.0f32, 1.0], (1, 2), &device()).unwrap();

        let loss_all = scalar_f32(&masked_patch_mse(&pred, &target, &all).unwrap()).unwrap();
        let loss_clean =
            scalar_f32(&masked_patch_mse(&pred, &target, &only_clean).unwrap()).unwrap();
        let loss_dirty =
            scalar_f32(&masked_patch_mse(&pred, &target, &only_dirty).unwrap()).unwrap();

        assert!((loss_clean - 0.0).abs() < 1e-6);
        assert!((loss_dirty - 1.0).abs() < 1e-6);
        assert!((loss_all - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_patches_zero_mean() {
        let target =
            Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], (1, 1, 4), &device()).unwrap();
        let normed = normalize_patches(&target).unwrap();
        let mean = scalar_f32(&normed.mean(D::Minus1).unwrap()).unwrap();
        assert!(mean.abs() < 1e-5);
    }
}
