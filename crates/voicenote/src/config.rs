//! Configuration loading and resolution.
//!
//! Precedence: command-line flags, then the TOML file, then built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use voicenote_core::config::CompositionConfig;
use voicenote_types::ExportFormat;

/// Default artifact base name (matches the download name of the web front end).
pub const DEFAULT_OUTPUT_NAME: &str = "voicenote";

/// Optional settings loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct VoicenoteConfig {
    /// Effect library directory containing `files.json`.
    pub library_dir: Option<String>,
    /// Export container (`wav` or `wav-float`).
    pub export_format: Option<ExportFormat>,
    /// Directory for artifacts when `--out` is not given.
    pub output_dir: Option<String>,
    /// Artifact base name, without extension.
    pub output_name: Option<String>,
}

impl VoicenoteConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        toml::from_str::<VoicenoteConfig>(&raw).with_context(|| format!("parse config {:?}", path))
    }
}

/// Fully resolved settings used by the runtime.
#[derive(Clone, Debug)]
pub struct Settings {
    pub library_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub output_name: String,
    pub composition: CompositionConfig,
}

impl Settings {
    /// Merge CLI overrides over file values over defaults.
    pub fn resolve(
        file: &VoicenoteConfig,
        library: Option<&Path>,
        format: Option<ExportFormat>,
    ) -> Self {
        let library_dir = library
            .map(Path::to_path_buf)
            .or_else(|| non_empty(file.library_dir.as_deref()).map(PathBuf::from));
        let output_dir = non_empty(file.output_dir.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let output_name = non_empty(file.output_name.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_NAME)
            .to_string();
        let composition = CompositionConfig {
            export_format: format.or(file.export_format).unwrap_or_default(),
            ..CompositionConfig::default()
        };

        Self {
            library_dir,
            output_dir,
            output_name,
            composition,
        }
    }

    /// Where the artifact goes when no explicit path is given.
    pub fn default_output_path(&self) -> PathBuf {
        let ext = self.composition.export_format.extension();
        self.output_dir.join(format!("{}.{ext}", self.output_name))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
