//! Phase and task identifiers.
//!
//! `Phase` is threaded explicitly through every objective call so that
//! metric routing never depends on a hidden training-mode flag. `Task`
//! names the objective for metric keys and registry lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution phase of a training step. Exactly one phase is active per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Gradient-producing training step.
    Train,
    /// Validation step.
    Val,
    /// Test step (explicit override, independent of the trainer mode).
    Test,
}

impl Phase {
    /// Lower-case name used in metric keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Val => "val",
            Phase::Test => "test",
        }
    }

    /// All phases, in metric-table construction order.
    pub const ALL: [Phase; 3] = [Phase::Train, Phase::Val, Phase::Test];

    /// Whether generation and evaluation-only metrics run in this phase.
    pub fn is_eval(self) -> bool {
        !matches!(self, Phase::Train)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Objective task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    /// Masked language modeling.
    Mlm,
    /// Unimodal MLM (pseudo-vision placeholder).
    Umlm,
    /// Masked image modeling.
    Mim,
    /// Unimodal MIM (pseudo-language placeholder).
    Umim,
    /// Image-text matching.
    Itm,
    /// Image-text contrastive.
    Itc,
    /// Visual question answering.
    Vqa,
    /// Single-label classification.
    Cls,
    /// Multi-label classification.
    Mlc,
    /// Conditional language generation (captioning).
    Clm,
    /// Image-text retrieval ranking loss.
    Irtr,
}

impl Task {
    /// Lower-case name used in metric keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Task::Mlm => "mlm",
            Task::Umlm => "umlm",
            Task::Mim => "mim",
            Task::Umim => "umim",
            Task::Itm => "itm",
            Task::Itc => "itc",
            Task::Vqa => "vqa",
            Task::Cls => "cls",
            Task::Mlc => "mlc",
            Task::Clm => "clm",
            Task::Irtr => "irtr",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Train.as_str(), "train");
        assert_eq!(Phase::Val.as_str(), "val");
        assert_eq!(Phase::Test.as_str(), "test");
    }

    #[test]
    fn test_eval_phases() {
        assert!(!Phase::Train.is_eval());
        assert!(Phase::Val.is_eval());
        assert!(Phase::Test.is_eval());
    }

    #[test]
    fn test_task_key_format() {
        let key = format!("{}/{}/loss", Task::Mlm, Phase::Train);
        assert_eq!(key, "mlm/train/loss");
    }
}
