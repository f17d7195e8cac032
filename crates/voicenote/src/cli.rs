use std::path::PathBuf;

use clap::{Parser, Subcommand};
use voicenote_types::ExportFormat;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "voicenote", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Effect library directory (must contain files.json)
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// Export container: wav (16-bit) or wav-float (32-bit float)
    #[arg(long, global = true)]
    pub format: Option<ExportFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mix an effect over a recording and export the first `--target-ms` of it
    Compose(ComposeArgs),

    /// List effects in the library
    Effects,

    /// Decode a file and print its layout
    Probe {
        /// Path to an audio file
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ComposeArgs {
    /// Captured voice recording
    #[arg(long)]
    pub recording: PathBuf,

    /// MIME hint for the recording, e.g. audio/ogg or audio/webm.
    ///
    /// Only the hint is forwarded; the codec inside must still be one Symphonia decodes.
    /// Opus is not among them, so a browser webm/opus capture fails to decode.
    #[arg(long)]
    pub recording_mime: Option<String>,

    /// Effect file path
    #[arg(long, conflicts_with = "effect_name", required_unless_present = "effect_name")]
    pub effect: Option<PathBuf>,

    /// Effect name from the library
    #[arg(long)]
    pub effect_name: Option<String>,

    /// Maximum artifact length in milliseconds (usually the elapsed recording time)
    #[arg(long)]
    pub target_ms: u64,

    /// Output path (defaults to <output_dir>/<output_name>.<ext>)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Print a JSON report instead of a summary line
    #[arg(long)]
    pub json: bool,
}
