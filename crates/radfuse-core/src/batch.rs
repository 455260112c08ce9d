//! Typed training batch.
//!
//! The collator hands each objective a `Batch` with the fields its task
//! needs populated. Task-specific fields are optional; an objective that
//! finds its field missing fails fast with `CoreError::MissingField`.

use candle_core::Tensor;

use crate::error::{CoreError, CoreResult};

/// Token-sequence triple for one caption set.
#[derive(Debug, Clone)]
pub struct TextFields {
    /// Token ids `[N, T]`.
    pub ids: Tensor,
    /// Attention masks `[N, T]`.
    pub masks: Tensor,
    /// MLM labels `[N, T]`, `IGNORE_INDEX` at no-loss positions.
    pub labels: Tensor,
}

/// VQA supervision: ragged (answer-index, soft-score) pairs per example.
#[derive(Debug, Clone, Default)]
pub struct VqaFields {
    /// Answer-vocabulary indices per example.
    pub labels: Vec<Vec<u32>>,
    /// Soft scores in `[0, 1]` parallel to `labels`.
    pub scores: Vec<Vec<f32>>,
    /// Answer-type category per example.
    pub answer_types: Vec<u32>,
}

/// One training batch. Image tensors are `[N, C, H, W]`, one per
/// augmentation view.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// True images, one tensor per view.
    pub images: Vec<Tensor>,
    /// Negative images: `false_images[k][view]`.
    pub false_images: Vec<Vec<Tensor>>,
    /// Tokenized captions.
    pub text: Option<TextFields>,
    /// Negative captions, one `TextFields` per configured k.
    pub false_texts: Vec<TextFields>,
    /// VQA supervision.
    pub vqa: Option<VqaFields>,
    /// Single-label classification targets `[N]`.
    pub cls_labels: Option<Tensor>,
    /// Multi-label classification targets `[N, num_labels]`.
    pub mlc_labels: Option<Tensor>,
    /// Findings section of the paired report, one per example.
    pub findings: Vec<String>,
    /// Impression section of the paired report, one per example.
    pub impression: Vec<String>,
    /// Source-image identity per example (retrieval ground truth).
    pub image_index: Vec<i64>,
}

impl Batch {
    /// Batch size, taken from the first image view.
    pub fn len(&self) -> CoreResult<usize> {
        let image = self.primary_image()?;
        Ok(image.dim(0)?)
    }

    /// Whether the batch carries no images.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// First image view, the one replicated for retrieval scoring.
    pub fn primary_image(&self) -> CoreResult<&Tensor> {
        self.images.first().ok_or(CoreError::MissingField { field: "images" })
    }

    /// Tokenized captions, required by text-consuming objectives.
    pub fn text(&self) -> CoreResult<&TextFields> {
        self.text.as_ref().ok_or(CoreError::MissingField { field: "text" })
    }

    /// First negative image set (ITM pairing).
    pub fn false_image(&self, k: usize) -> CoreResult<&Vec<Tensor>> {
        self.false_images
            .get(k)
            .ok_or(CoreError::MissingField { field: "false_images" })
    }

    /// k-th negative caption set (IRTR candidates).
    pub fn false_text(&self, k: usize) -> CoreResult<&TextFields> {
        self.false_texts
            .get(k)
            .ok_or(CoreError::MissingField { field: "false_texts" })
    }

    /// VQA supervision, required by the VQA objective.
    pub fn vqa(&self) -> CoreResult<&VqaFields> {
        self.vqa.as_ref().ok_or(CoreError::MissingField { field: "vqa" })
    }

    /// Classification targets.
    pub fn cls_labels(&self) -> CoreResult<&Tensor> {
        self.cls_labels
            .as_ref()
            .ok_or(CoreError::MissingField { field: "cls_labels" })
    }

    /// Multi-label targets.
    pub fn mlc_labels(&self) -> CoreResult<&Tensor> {
        self.mlc_labels
            .as_ref()
            .ok_or(CoreError::MissingField { field: "mlc_labels" })
    }

    /// Replace the image views, keeping every other field.
    pub fn with_images(mut self, images: Vec<Tensor>) -> Self {
        self.images = images;
        self
    }

    /// Replace the caption fields, keeping every other field.
    pub fn with_text(mut self, text: TextFields) -> Self {
        self.text = Some(text);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_missing_fields_fail_fast() {
        let batch = Batch::default();
        assert!(batch.is_empty());
        assert!(batch.text().is_err());
        assert!(batch.vqa().is_err());
        assert!(batch.cls_labels().is_err());
    }

    #[test]
    fn test_len_from_primary_image() {
        let device = Device::Cpu;
        let image = Tensor::zeros((3, 1, 4, 4), DType::F32, &device).unwrap();
        let batch = Batch::default().with_images(vec![image]);
        assert_eq!(batch.len().unwrap(), 3);
    }
}
