//! Explicit metric table.
//!
//! Accumulators are keyed by `(Phase, Task, MetricKind)` and built once at
//! construction, replacing name-based attribute dispatch with type-checked
//! access. Entries are mutated once per batch call and reset at epoch
//! boundaries by the external trainer.

use std::collections::HashMap;

use candle_core::Tensor;

use radfuse_core::{Phase, Task};

use super::auroc::AurocMetric;
use super::f1::F1Metric;
use super::scalar::{AccuracyMetric, MeanMetric};
use super::text::{BleuMetric, CaptionMetric, RougeMetric};
use super::vqa::VqaScoreMetric;
use crate::error::{ObjectiveError, ObjectiveResult};

/// Which accumulator a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Loss,
    Accuracy,
    Score,
    Auroc,
    F1,
    Bleu1,
    Bleu2,
    Bleu3,
    Bleu4,
    Rouge,
    Caption,
}

/// One accumulator instance.
#[derive(Debug, Clone)]
pub enum MetricState {
    Mean(MeanMetric),
    Accuracy(AccuracyMetric),
    Auroc(AurocMetric),
    F1(F1Metric),
    VqaScore(VqaScoreMetric),
    Bleu(BleuMetric),
    Rouge(RougeMetric),
    Caption(CaptionMetric),
}

impl MetricState {
    fn for_kind(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Loss => MetricState::Mean(MeanMetric::new()),
            MetricKind::Accuracy => MetricState::Accuracy(AccuracyMetric::new()),
            MetricKind::Score => MetricState::VqaScore(VqaScoreMetric::new()),
            MetricKind::Auroc => MetricState::Auroc(AurocMetric::new()),
            MetricKind::F1 => MetricState::F1(F1Metric::new()),
            MetricKind::Bleu1 => MetricState::Bleu(BleuMetric::new(1)),
            MetricKind::Bleu2 => MetricState::Bleu(BleuMetric::new(2)),
            MetricKind::Bleu3 => MetricState::Bleu(BleuMetric::new(3)),
            MetricKind::Bleu4 => MetricState::Bleu(BleuMetric::new(4)),
            MetricKind::Rouge => MetricState::Rouge(RougeMetric::new()),
            MetricKind::Caption => MetricState::Caption(CaptionMetric::new()),
        }
    }

    /// Aggregate value since the last reset.
    pub fn compute(&self) -> f32 {
        match self {
            MetricState::Mean(m) => m.compute(),
            MetricState::Accuracy(m) => m.compute(),
            MetricState::Auroc(m) => m.compute(),
            MetricState::F1(m) => m.compute(),
            MetricState::VqaScore(m) => m.compute(),
            MetricState::Bleu(m) => m.compute(),
            MetricState::Rouge(m) => m.compute(),
            MetricState::Caption(m) => m.compute(),
        }
    }

    fn reset(&mut self) {
        match self {
            MetricState::Mean(m) => m.reset(),
            MetricState::Accuracy(m) => m.reset(),
            MetricState::Auroc(m) => m.reset(),
            MetricState::F1(m) => m.reset(),
            MetricState::VqaScore(m) => m.reset(),
            MetricState::Bleu(m) => m.reset(),
            MetricState::Rouge(m) => m.reset(),
            MetricState::Caption(m) => m.reset(),
        }
    }
}

/// Accumulator kinds tracked per task.
fn kinds_for(task: Task) -> &'static [MetricKind] {
    match task {
        Task::Mlm | Task::Umlm | Task::Itm | Task::Cls => {
            &[MetricKind::Loss, MetricKind::Accuracy]
        }
        Task::Mim | Task::Umim | Task::Itc | Task::Irtr => &[MetricKind::Loss],
        Task::Vqa => &[MetricKind::Loss, MetricKind::Score],
        Task::Mlc => &[MetricKind::Loss, MetricKind::Auroc, MetricKind::F1],
        Task::Clm => &[
            MetricKind::Loss,
            MetricKind::Bleu1,
            MetricKind::Bleu2,
            MetricKind::Bleu3,
            MetricKind::Bleu4,
            MetricKind::Rouge,
            MetricKind::Caption,
        ],
    }
}

/// Process-wide per-phase per-task accumulator table.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    table: HashMap<(Phase, Task, MetricKind), MetricState>,
}

impl MetricRegistry {
    /// Build every slot for the given tasks across all phases.
    pub fn for_tasks(tasks: &[Task]) -> Self {
        let mut table = HashMap::new();
        for &task in tasks {
            for &phase in Phase::ALL.iter() {
                for &kind in kinds_for(task) {
                    table.insert((phase, task, kind), MetricState::for_kind(kind));
                }
            }
        }
        Self { table }
    }

    fn slot_mut(
        &mut self,
        phase: Phase,
        task: Task,
        kind: MetricKind,
    ) -> ObjectiveResult<&mut MetricState> {
        self.table
            .get_mut(&(phase, task, kind))
            .ok_or(ObjectiveError::MetricSlot { phase, task, kind })
    }

    fn slot(&self, phase: Phase, task: Task, kind: MetricKind) -> ObjectiveResult<&MetricState> {
        self.table
            .get(&(phase, task, kind))
            .ok_or(ObjectiveError::MetricSlot { phase, task, kind })
    }

    /// Record one batch loss; returns the batch value for logging.
    pub fn update_loss(&mut self, phase: Phase, task: Task, value: f32) -> ObjectiveResult<f32> {
        match self.slot_mut(phase, task, MetricKind::Loss)? {
            MetricState::Mean(m) => Ok(m.update(value)),
            _ => Err(ObjectiveError::MetricSlot { phase, task, kind: MetricKind::Loss }),
        }
    }

    /// Update argmax accuracy; returns the batch accuracy.
    pub fn update_accuracy(
        &mut self,
        phase: Phase,
        task: Task,
        logits: &Tensor,
        targets: &Tensor,
        ignore_index: Option<i64>,
    ) -> ObjectiveResult<f32> {
        match self.slot_mut(phase, task, MetricKind::Accuracy)? {
            MetricState::Accuracy(m) => m.update(logits, targets, ignore_index),
            _ => Err(ObjectiveError::MetricSlot { phase, task, kind: MetricKind::Accuracy }),
        }
    }

    /// Update the VQA score; returns the batch mean score.
    pub fn update_vqa_score(
        &mut self,
        phase: Phase,
        task: Task,
        logits: &Tensor,
        targets: &Tensor,
        answer_types: &[u32],
    ) -> ObjectiveResult<f32> {
        match self.slot_mut(phase, task, MetricKind::Score)? {
            MetricState::VqaScore(m) => m.update(logits, targets, answer_types),
            _ => Err(ObjectiveError::MetricSlot { phase, task, kind: MetricKind::Score }),
        }
    }

    /// Update an AUROC or F1 slot with post-sigmoid probabilities.
    pub fn update_probabilities(
        &mut self,
        phase: Phase,
        task: Task,
        kind: MetricKind,
        probs: &Tensor,
        targets: &Tensor,
    ) -> ObjectiveResult<()> {
        match self.slot_mut(phase, task, kind)? {
            MetricState::Auroc(m) => m.update(probs, targets),
            MetricState::F1(m) => m.update(probs, targets),
            _ => Err(ObjectiveError::MetricSlot { phase, task, kind }),
        }
    }

    /// Update a BLEU/ROUGE/caption slot with generated and reference texts.
    pub fn update_texts(
        &mut self,
        phase: Phase,
        task: Task,
        kind: MetricKind,
        candidates: &[String],
        references: &[String],
    ) -> ObjectiveResult<()> {
        match self.slot_mut(phase, task, kind)? {
            MetricState::Bleu(m) => m.update(candidates, references),
            MetricState::Rouge(m) => m.update(candidates, references),
            MetricState::Caption(m) => m.update(candidates, references),
            _ => return Err(ObjectiveError::MetricSlot { phase, task, kind }),
        }
        Ok(())
    }

    /// Aggregate value of one slot since the last reset.
    pub fn compute(&self, phase: Phase, task: Task, kind: MetricKind) -> ObjectiveResult<f32> {
        Ok(self.slot(phase, task, kind)?.compute())
    }

    /// Reset every slot of one phase (epoch boundary).
    pub fn reset_phase(&mut self, phase: Phase) {
        for ((p, _, _), state) in self.table.iter_mut() {
            if *p == phase {
                state.reset();
            }
        }
    }

    /// Reset the whole table.
    pub fn reset_all(&mut self) {
        for state in self.table.values_mut() {
            state.reset();
        }
    }
}
