use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Container written by the encoder stage.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// RIFF/WAVE, 16-bit signed integer PCM.
    #[default]
    Wav,
    /// RIFF/WAVE, 32-bit IEEE float.
    WavFloat,
}

impl ExportFormat {
    /// MIME type declared alongside the encoded bytes.
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Wav | ExportFormat::WavFloat => "audio/wav",
        }
    }

    /// File extension used when the artifact is written to disk.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Wav | ExportFormat::WavFloat => "wav",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Wav => f.write_str("wav"),
            ExportFormat::WavFloat => f.write_str("wav-float"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "audio/wav" | "audio/x-wav" => Ok(ExportFormat::Wav),
            "wav-float" | "wav_float" | "f32" => Ok(ExportFormat::WavFloat),
            other => Err(format!("unsupported export format: {other}")),
        }
    }
}

/// Stage of a single composition run.
///
/// `Failed` is terminal and reachable from every non-terminal stage.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompositionStage {
    #[default]
    Idle,
    Decoding,
    Mixing,
    DurationCheck,
    Slicing,
    Encoding,
    Ready,
    Failed,
}

/// Snapshot of the pipeline, as seen by an observer.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositionStatus {
    /// Monotonic run counter; `0` before the first run.
    pub run_id: u64,
    /// Current (or last) stage.
    pub stage: CompositionStage,
    /// Message of the error that moved the run to `Failed`.
    pub error: Option<String>,
    /// Merged duration in milliseconds, once mixing finished.
    pub merged_ms: Option<u64>,
    /// Requested upper bound in milliseconds.
    pub target_ms: Option<u64>,
}

/// Summary of a finished run, printed by the CLI with `--json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositionReport {
    /// Where the artifact was written.
    pub path: String,
    pub mime_type: String,
    pub format: ExportFormat,
    /// Artifact length in whole milliseconds, rounded down from the slice's frame count.
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u64,
    pub bytes: u64,
}
