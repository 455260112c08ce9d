//! Objective configuration.
//!
//! Design principles (shared across the workspace):
//!
//! - **NO FALLBACKS**: invalid configuration returns an error, never a
//!   silent default.
//! - **FAIL FAST**: file-not-found and parse errors return immediately.
//! - **VALIDATION**: `validate()` checks cross-field constraints.
//!
//! # TOML Structure
//!
//! ```toml
//! vocab_size = 30522
//! vqa_label_size = 3129
//! cls_label_size = 2
//! mlc_label_size = 14
//! norm_pix_loss = true
//! clm_max_text_len = 128
//! clm_num_beams = 3
//! draw_false_text = 15
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Sentinel label excluded from token-level losses.
pub const IGNORE_INDEX: i64 = -100;

/// Configuration shared by every objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectivesConfig {
    /// Token vocabulary size of the masked-language head.
    pub vocab_size: usize,
    /// Answer-vocabulary size of the VQA head.
    pub vqa_label_size: usize,
    /// Label-set size of the classification head.
    pub cls_label_size: usize,
    /// Label count of the multi-label head.
    pub mlc_label_size: usize,
    /// Intermediate encoder layer feeding the MIM head; `None` = final layer.
    pub mim_layer: Option<usize>,
    /// Standardize each target patch before the reconstruction loss.
    pub norm_pix_loss: bool,
    /// Unimodal ablation: substitute pseudo-vision input (text-only model).
    pub language_only: bool,
    /// Unimodal ablation: substitute pseudo-language input (vision-only model).
    pub vision_only: bool,
    /// Maximum caption length for the generation decoder.
    pub clm_max_text_len: usize,
    /// Beam count for caption decoding.
    pub clm_num_beams: usize,
    /// Number of pre-drawn false captions per IRTR anchor.
    pub draw_false_text: usize,
    /// Sentinel label excluded from token-level losses.
    pub ignore_index: i64,
}

impl Default for ObjectivesConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30522,
            vqa_label_size: 3129,
            cls_label_size: 2,
            mlc_label_size: 14,
            mim_layer: None,
            norm_pix_loss: true,
            language_only: false,
            vision_only: false,
            clm_max_text_len: 128,
            clm_num_beams: 3,
            draw_false_text: 15,
            ignore_index: IGNORE_INDEX,
        }
    }
}

impl ObjectivesConfig {
    /// Load from a TOML file. Missing file or parse failure is an error.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let cfg: Self = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Cross-field validation.
    pub fn validate(&self) -> CoreResult<()> {
        if self.language_only && self.vision_only {
            return Err(CoreError::ConfigError(
                "language_only and vision_only are mutually exclusive".to_string(),
            ));
        }
        if self.vocab_size == 0 {
            return Err(CoreError::ConfigError("vocab_size must be > 0".to_string()));
        }
        if self.vqa_label_size == 0 {
            return Err(CoreError::ConfigError("vqa_label_size must be > 0".to_string()));
        }
        if self.clm_num_beams == 0 {
            return Err(CoreError::ConfigError("clm_num_beams must be > 0".to_string()));
        }
        if self.clm_max_text_len < 2 {
            return Err(CoreError::ConfigError(
                "clm_max_text_len must allow at least one generated token".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = ObjectivesConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unimodal_flags_mutually_exclusive() {
        let cfg = ObjectivesConfig {
            language_only: true,
            vision_only: true,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_zero_beams_rejected() {
        let cfg = ObjectivesConfig { clm_num_beams: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
