//! Shared state handed to every objective call.

use radfuse_core::{MetricSink, MultimodalEncoder, ObjectivesConfig, Phase, Task};

use crate::metrics::MetricRegistry;

/// Bundles the collaborators an objective needs for one batch call: the
/// encoder, configuration, the phase-keyed metric table, and the scalar
/// logging sink. Task heads are passed per call since the dispatcher owns
/// them.
pub struct TaskContext<'a> {
    pub encoder: &'a dyn MultimodalEncoder,
    pub config: &'a ObjectivesConfig,
    pub metrics: &'a mut MetricRegistry,
    pub sink: &'a dyn MetricSink,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        encoder: &'a dyn MultimodalEncoder,
        config: &'a ObjectivesConfig,
        metrics: &'a mut MetricRegistry,
        sink: &'a dyn MetricSink,
    ) -> Self {
        Self { encoder, config, metrics, sink }
    }

    /// Emit one scalar keyed `"{task}/{phase}/{metric}"`.
    pub(crate) fn log(&self, task: Task, phase: Phase, metric: &str, value: f32) {
        self.sink.log_scalar(&format!("{task}/{phase}/{metric}"), value);
    }
}
