use std::sync::{Arc, Mutex};

use voicenote_types::{CompositionStage, CompositionStatus};

/// Shared composition status updated by the pipeline as it moves between stages.
#[derive(Debug, Default)]
pub struct PipelineStatusState {
    /// Incremented at the start of every run.
    pub run_id: u64,
    pub stage: CompositionStage,
    /// Error message of the last failed run.
    pub error: Option<String>,
    pub merged_ms: Option<u64>,
    pub target_ms: Option<u64>,
}

impl PipelineStatusState {
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Reset per-run fields and return the new run id.
    pub fn begin_run(&mut self, target_ms: u64) -> u64 {
        self.run_id += 1;
        self.stage = CompositionStage::Decoding;
        self.error = None;
        self.merged_ms = None;
        self.target_ms = Some(target_ms);
        self.run_id
    }

    pub fn snapshot(&self) -> CompositionStatus {
        CompositionStatus {
            run_id: self.run_id,
            stage: self.stage,
            error: self.error.clone(),
            merged_ms: self.merged_ms,
            target_ms: self.target_ms,
        }
    }
}
