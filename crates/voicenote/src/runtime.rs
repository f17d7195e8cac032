//! Command implementations behind the CLI.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use voicenote_core::decode::{AudioSource, SymphoniaDecoder};
use voicenote_core::library::EffectLibrary;
use voicenote_core::output::OutputSlot;
use voicenote_core::pipeline::{CompositionPipeline, CompositionRequest};
use voicenote_types::CompositionReport;

use crate::cli::ComposeArgs;
use crate::config::Settings;

/// Install a Ctrl-C handler that requests cancellation; a second Ctrl-C exits.
pub fn install_cancel_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let res = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::Relaxed) {
            std::process::exit(130);
        }
        tracing::warn!("cancel requested; press Ctrl-C again to exit");
    });
    if let Err(e) = res {
        tracing::warn!("ctrl-c handler not installed: {e}");
    }
    cancel
}

/// Run one composition and write the artifact to disk.
pub fn run_compose(
    settings: &Settings,
    args: &ComposeArgs,
    cancel: &AtomicBool,
) -> Result<CompositionReport> {
    let effect = load_effect(settings, args)?;
    let mut recording = AudioSource::from_path(&args.recording)
        .with_context(|| format!("read recording {:?}", args.recording))?;
    if let Some(mime) = args.recording_mime.as_deref() {
        recording = recording.with_mime_type(mime);
    }

    let pipeline = CompositionPipeline::with_default_codecs(settings.composition.clone());
    let mut slot = OutputSlot::new();
    slot.begin_run();
    let result = pipeline.run(
        CompositionRequest {
            effect,
            recording,
            target_ms: args.target_ms,
        },
        Some(cancel),
    );
    slot.finish(result).context("compose")?;
    let composition = slot
        .ready()
        .ok_or_else(|| anyhow!("composition finished without an artifact"))?;

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| settings.default_output_path());
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    std::fs::write(&out, &composition.artifact.bytes)
        .with_context(|| format!("write artifact {:?}", out))?;
    tracing::info!(
        path = %out.display(),
        bytes = composition.artifact.bytes.len(),
        "artifact written"
    );

    let buffer = &composition.buffer;
    Ok(CompositionReport {
        path: out.display().to_string(),
        mime_type: composition.artifact.mime_type.clone(),
        format: composition.artifact.format,
        duration_ms: composition.duration_ms,
        sample_rate: buffer.sample_rate(),
        channels: u16::try_from(buffer.channel_count()).unwrap_or(u16::MAX),
        frames: buffer.len() as u64,
        bytes: composition.artifact.bytes.len() as u64,
    })
}

fn load_effect(settings: &Settings, args: &ComposeArgs) -> Result<AudioSource> {
    if let Some(path) = args.effect.as_deref() {
        return AudioSource::from_path(path).with_context(|| format!("read effect {:?}", path));
    }
    let name = args
        .effect_name
        .as_deref()
        .ok_or_else(|| anyhow!("either --effect or --effect-name is required"))?;
    let library = open_library(settings)?;
    library
        .read(name)
        .with_context(|| format!("load effect {name:?} from {:?}", library.root()))
}

fn open_library(settings: &Settings) -> Result<EffectLibrary> {
    let dir = settings
        .library_dir
        .as_deref()
        .ok_or_else(|| anyhow!("no effect library configured (use --library or library_dir)"))?;
    EffectLibrary::load(dir).with_context(|| format!("open effect library {:?}", dir))
}

/// Print `name -> file` for every effect in the library.
pub fn list_effects(settings: &Settings) -> Result<()> {
    let library = open_library(settings)?;
    if library.is_empty() {
        println!("(no effects in {})", library.root().display());
        return Ok(());
    }
    for (name, file) in library.entries() {
        println!("{name:<24} {file}");
    }
    Ok(())
}

/// Decode a file and print its layout.
pub fn probe(path: &Path) -> Result<()> {
    println!("{}", probe_summary(path)?);
    Ok(())
}

fn probe_summary(path: &Path) -> Result<String> {
    let source = AudioSource::from_path(path).with_context(|| format!("read {:?}", path))?;
    let (buffer, info) = SymphoniaDecoder::new()
        .decode_with_info(&source)
        .with_context(|| format!("decode {:?}", path))?;

    let mut line = format!(
        "{}: {} Hz, {} ch, {} frames, {} ({}",
        path.display(),
        buffer.sample_rate(),
        buffer.channel_count(),
        buffer.len(),
        format_duration(buffer.duration_ms() / 1000),
        info.codec.as_deref().unwrap_or("unknown codec"),
    );
    if let Some(bits) = info.bit_depth {
        line.push_str(&format!(", {bits}-bit"));
    }
    line.push(')');
    if let Some(declared) = info.duration_ms.filter(|ms| *ms != buffer.duration_ms()) {
        line.push_str(&format!(", header says {declared} ms"));
    }
    Ok(line)
}

/// Format whole seconds as `mm:ss`.
pub fn format_duration(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoicenoteConfig;
    use std::path::PathBuf;
    use voicenote_core::PcmBuffer;
    use voicenote_core::encode::{Encoder, WavEncoder};
    use voicenote_types::ExportFormat;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("voicenote-rt-{}-{tag}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_wav(path: &Path, rate: u32, frames: usize, value: f32) {
        let buffer = PcmBuffer::new(rate, vec![vec![value; frames]]).unwrap();
        let artifact = WavEncoder::new(ExportFormat::WavFloat).encode(&buffer).unwrap();
        std::fs::write(path, artifact.bytes).unwrap();
    }

    fn compose_args(dir: &Path, target_ms: u64) -> ComposeArgs {
        ComposeArgs {
            recording: dir.join("rec.wav"),
            recording_mime: None,
            effect: None,
            effect_name: Some("horn".into()),
            target_ms,
            out: Some(dir.join("out/voicenote.wav")),
            json: false,
        }
    }

    #[test]
    fn format_duration_pads_minutes_and_seconds() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(3_600), "60:00");
    }

    #[test]
    fn probe_summary_reports_layout_and_bit_depth() {
        let dir = scratch_dir("probe");
        let path = dir.join("tone.wav");
        let buffer = PcmBuffer::new(8_000, vec![vec![0.25; 16_000]]).unwrap();
        let artifact = WavEncoder::new(ExportFormat::Wav).encode(&buffer).unwrap();
        std::fs::write(&path, artifact.bytes).unwrap();

        let line = probe_summary(&path).unwrap();
        assert!(line.contains("8000 Hz, 1 ch, 16000 frames, 00:02"), "{line}");
        assert!(line.contains("PCM_S16, 16-bit)"), "{line}");
        assert!(!line.contains("header says"), "{line}");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn compose_with_library_effect_writes_artifact() {
        let dir = scratch_dir("compose");
        std::fs::write(dir.join("files.json"), r#"{"horn": "horn.wav"}"#).unwrap();
        write_wav(&dir.join("horn.wav"), 8_000, 8_000, 0.25);
        write_wav(&dir.join("rec.wav"), 8_000, 24_000, 0.25);

        let settings = Settings::resolve(&VoicenoteConfig::default(), Some(dir.as_path()), None);
        let cancel = AtomicBool::new(false);
        let report = run_compose(&settings, &compose_args(&dir, 2_000), &cancel).unwrap();

        assert_eq!(report.duration_ms, 2_000);
        assert_eq!(report.frames, 16_000);
        assert_eq!(report.channels, 1);
        assert_eq!(report.mime_type, "audio/wav");
        let written = std::fs::metadata(dir.join("out/voicenote.wav")).unwrap();
        assert_eq!(written.len(), report.bytes);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn compose_failure_writes_nothing() {
        let dir = scratch_dir("policy");
        std::fs::write(dir.join("files.json"), r#"{"horn": "horn.wav"}"#).unwrap();
        write_wav(&dir.join("horn.wav"), 8_000, 8_000, 0.25);
        write_wav(&dir.join("rec.wav"), 8_000, 24_000, 0.25);

        let settings = Settings::resolve(&VoicenoteConfig::default(), Some(dir.as_path()), None);
        let cancel = AtomicBool::new(false);
        let err = run_compose(&settings, &compose_args(&dir, 3_000), &cancel).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<voicenote_core::Error>(),
            Some(voicenote_core::Error::DurationPolicy { .. })
        ));
        assert!(!dir.join("out/voicenote.wav").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_library_is_reported() {
        let settings = Settings::resolve(&VoicenoteConfig::default(), None, None);
        let args = compose_args(Path::new("/nonexistent"), 1_000);
        assert!(load_effect(&settings, &args).is_err());
    }
}
