//! Whole-source audio decode stage.
//!
//! Uses Symphonia to:
//! - probe the in-memory container/codec
//! - decode every packet of the default track into interleaved `f32`
//! - hand back a planar [`PcmBuffer`]

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::buffer::PcmBuffer;
use crate::error::{Error, Result};

/// Raw encoded audio plus optional format hints.
#[derive(Clone, Debug, Default)]
pub struct AudioSource {
    /// Label used in logs and errors (file name, "recording", ...).
    pub name: String,
    pub bytes: Vec<u8>,
    /// File extension hint, without the dot.
    pub extension: Option<String>,
    /// MIME type hint, e.g. `audio/webm`.
    pub mime_type: Option<String>,
}

impl AudioSource {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            extension: None,
            mime_type: None,
        }
    }

    /// Read a file fully into memory, using its extension as the probe hint.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            name: path.display().to_string(),
            bytes,
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
            mime_type: None,
        })
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    fn hint(&self) -> Hint {
        let mut hint = Hint::new();
        if let Some(ext) = self.extension.as_deref() {
            hint.with_extension(ext);
        }
        if let Some(mime) = self.mime_type.as_deref() {
            hint.mime_type(mime);
        }
        hint
    }
}

/// Host capability that turns encoded bytes into PCM.
///
/// Implementations must not share mutable state between calls; the pipeline
/// decodes both sources concurrently.
pub trait Decoder: Send + Sync {
    fn decode(&self, source: &AudioSource) -> Result<PcmBuffer>;
}

/// Metadata captured while probing the source.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Source bit depth (best-effort).
    pub bit_depth: Option<u16>,
    /// Duration reported by the container, if any.
    pub duration_ms: Option<u64>,
}

/// [`Decoder`] backed by Symphonia's default probe and codec registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode `source` and also return what the container reported about it.
    pub fn decode_with_info(&self, source: &AudioSource) -> Result<(PcmBuffer, SourceInfo)> {
        let name = source.name.as_str();
        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(source.bytes.clone())),
            Default::default(),
        );

        let probed = symphonia::default::get_probe()
            .format(
                &source.hint(),
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::decode(name, e))?;

        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| Error::decode(name, "no default audio track"))?;
        let track_id = track.id;
        let codec_params: CodecParameters = track.codec_params.clone();

        let info = SourceInfo {
            codec: codec_name_from_params(&codec_params),
            bit_depth: codec_params
                .bits_per_sample
                .or(codec_params.bits_per_coded_sample)
                .and_then(|v| u16::try_from(v).ok()),
            duration_ms: duration_ms_from_codec_params(&codec_params),
        };

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::decode(name, e))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut layout: Option<(u32, usize)> = None;
        let mut skipped = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(Error::decode(name, e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    skipped += 1;
                    tracing::warn!(source = name, "skipping corrupt packet: {e}");
                    continue;
                }
                Err(e) => return Err(Error::decode(name, e)),
            };

            let spec = *decoded.spec();
            let current = (spec.rate, spec.channels.count());
            match layout {
                None => layout = Some(current),
                Some(prev) if prev != current => {
                    return Err(Error::decode(
                        name,
                        format!(
                            "stream layout changed from {} Hz/{} ch to {} Hz/{} ch",
                            prev.0, prev.1, current.0, current.1
                        ),
                    ));
                }
                Some(_) => {}
            }

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        let (rate, channels) =
            layout.ok_or_else(|| Error::decode(name, "no decodable audio packets"))?;
        let buffer = PcmBuffer::from_interleaved(rate, channels, &samples)?;

        tracing::debug!(
            source = name,
            rate_hz = rate,
            channels,
            frames = buffer.len(),
            skipped,
            codec = info.codec.as_deref().unwrap_or("unknown"),
            "decoded"
        );
        Ok((buffer, info))
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, source: &AudioSource) -> Result<PcmBuffer> {
        self.decode_with_info(source).map(|(buffer, _)| buffer)
    }
}

/// Best-effort duration in milliseconds from codec metadata.
///
/// Returns `None` if the container does not provide total frames or sample rate.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

/// Best-effort codec label for logs.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
