use std::time::Duration;

use voicenote_types::ExportFormat;

/// Tuning parameters shared by the composition stages.
#[derive(Clone, Debug)]
pub struct CompositionConfig {
    /// Container produced by the export stage.
    pub export_format: ExportFormat,
    /// How often the pipeline re-checks the cancel flag while waiting on decoders.
    pub decode_poll_interval: Duration,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            export_format: ExportFormat::Wav,
            decode_poll_interval: Duration::from_millis(50),
        }
    }
}
