//! Encoder inference request and result types.

use std::collections::HashMap;

use candle_core::Tensor;

use crate::error::{CoreError, CoreResult};

/// Flags controlling one encoder forward pass. The encoder must honor
/// masking and pseudo-modality substitution deterministically per call.
#[derive(Debug, Clone, Default)]
pub struct InferRequest {
    /// Apply text token masking and regenerate `text_labels`.
    pub mask_text: bool,
    /// Apply image patch masking and emit `mim_*` artifacts.
    pub mask_image: bool,
    /// Substitute the placeholder embedding for the vision modality.
    pub pseudo_vision: bool,
    /// Substitute the placeholder embedding for the language modality.
    pub pseudo_language: bool,
    /// Score-time replacement for the batch image (retrieval ranking).
    pub image_override: Option<Tensor>,
}

impl InferRequest {
    /// Masked-text request (MLM family): image masking stays off.
    pub fn masked_text() -> Self {
        Self { mask_text: true, ..Self::default() }
    }

    /// Masked-image request (MIM family): text masking stays off.
    pub fn masked_image() -> Self {
        Self { mask_image: true, ..Self::default() }
    }

    /// Unmasked request (matching / classification / generation tasks).
    pub fn unmasked() -> Self {
        Self::default()
    }

    /// Enable the pseudo-vision placeholder.
    pub fn with_pseudo_vision(mut self, on: bool) -> Self {
        self.pseudo_vision = on;
        self
    }

    /// Enable the pseudo-language placeholder.
    pub fn with_pseudo_language(mut self, on: bool) -> Self {
        self.pseudo_language = on;
        self
    }

    /// Replace the batch image at scoring time.
    pub fn with_image_override(mut self, image: Tensor) -> Self {
        self.image_override = Some(image);
        self
    }
}

/// Result of one encoder forward pass.
///
/// Masking artifacts are present only when the matching request flag was
/// set; consumers fail fast when a required artifact is missing.
#[derive(Debug, Clone)]
pub struct InferOutput {
    /// Fused text-token features `[N, T, D]`.
    pub multi_modal_text_feats: Tensor,
    /// Fused image-patch features from the final layer `[N, L, D]`.
    pub multi_modal_image_feats: Tensor,
    /// Fused image-patch features tapped at intermediate layers.
    pub image_feats_by_layer: HashMap<usize, Tensor>,
    /// Pooled multimodal features `[N, D']`.
    pub multi_modal_cls_feats: Tensor,
    /// Binary removed-patch mask `[N, L]` (1 = removed).
    pub mim_masks: Option<Tensor>,
    /// Patch restoration ordering `[N, L]`.
    pub mim_ids_restore: Option<Tensor>,
    /// Patchified pixel targets `[N, L, P]`.
    pub patched_images: Option<Tensor>,
    /// Token labels regenerated under masking `[N, T]`.
    pub text_labels: Tensor,
    /// Token ids as seen by the encoder `[N, T]`.
    pub text_ids: Tensor,
}

impl InferOutput {
    /// Image features at `layer`, or the final layer when `layer` is `None`.
    pub fn image_feats_at(&self, layer: Option<usize>) -> CoreResult<&Tensor> {
        match layer {
            None => Ok(&self.multi_modal_image_feats),
            Some(idx) => self
                .image_feats_by_layer
                .get(&idx)
                .ok_or(CoreError::MissingField { field: "image_feats_by_layer" }),
        }
    }

    /// Removed-patch mask, required by the MIM family.
    pub fn mim_masks(&self) -> CoreResult<&Tensor> {
        self.mim_masks
            .as_ref()
            .ok_or(CoreError::MissingField { field: "mim_masks" })
    }

    /// Restoration ordering, required by the MIM family.
    pub fn mim_ids_restore(&self) -> CoreResult<&Tensor> {
        self.mim_ids_restore
            .as_ref()
            .ok_or(CoreError::MissingField { field: "mim_ids_restore" })
    }

    /// Patchified pixel targets, required by the MIM family.
    pub fn patched_images(&self) -> CoreResult<&Tensor> {
        self.patched_images
            .as_ref()
            .ok_or(CoreError::MissingField { field: "patched_images" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = InferRequest::masked_text();
        assert!(req.mask_text);
        assert!(!req.mask_image);

        let req = InferRequest::masked_image().with_pseudo_language(true);
        assert!(req.mask_image);
        assert!(req.pseudo_language);
        assert!(!req.pseudo_vision);
    }
}
