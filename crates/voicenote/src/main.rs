//! voicenote: mix a preset sound effect over a voice recording and export a bounded clip.
//!
//! ## Pipeline
//! 1. **Decode**: both sources are decoded with Symphonia on background threads.
//! 2. **Mix**: samples are summed (and clamped) into one buffer.
//! 3. **Slice**: the mix is trimmed to `--target-ms`; a mix that is not longer than the
//!    target is rejected.
//! 4. **Encode**: the slice is written as WAV via hound.
//!
//! ## Commands
//! - `compose`: run the pipeline and write the artifact.
//! - `effects`: list the effect library.
//! - `probe`: decode one file and print its layout.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use voicenote::cli::{Args, Command};
use voicenote::config::{Settings, VoicenoteConfig};
use voicenote::runtime;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,voicenote=info")
        }))
        .init();

    let file_config = match args.config.as_deref() {
        Some(path) => VoicenoteConfig::load(path)?,
        None => VoicenoteConfig::default(),
    };
    let settings = Settings::resolve(&file_config, args.library.as_deref(), args.format);

    match &args.cmd {
        Command::Compose(compose) => {
            let cancel = runtime::install_cancel_handler();
            let report = runtime::run_compose(&settings, compose, &cancel)?;
            if compose.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} ({}, {})",
                    report.path,
                    report.mime_type,
                    runtime::format_duration(report.duration_ms / 1000)
                );
            }
        }
        Command::Effects => runtime::list_effects(&settings)?,
        Command::Probe { path } => runtime::probe(path)?,
    }

    Ok(())
}
