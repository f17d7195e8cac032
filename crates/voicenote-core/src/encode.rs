//! Export stage: serialize a PCM buffer into a deliverable container.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use voicenote_types::ExportFormat;

use crate::buffer::PcmBuffer;
use crate::error::{Error, Result};

/// Encoded bytes plus the type they were declared as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub format: ExportFormat,
}

/// Host capability that turns PCM into an exported container.
pub trait Encoder: Send + Sync {
    fn encode(&self, buffer: &PcmBuffer) -> Result<EncodedArtifact>;
}

/// RIFF/WAVE encoder built on `hound`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WavEncoder {
    format: ExportFormat,
}

impl WavEncoder {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    fn spec(&self, buffer: &PcmBuffer) -> Result<WavSpec> {
        let channels = u16::try_from(buffer.channel_count())
            .map_err(|_| Error::Encode(format!("too many channels: {}", buffer.channel_count())))?;
        let (bits_per_sample, sample_format) = match self.format {
            ExportFormat::Wav => (16, SampleFormat::Int),
            ExportFormat::WavFloat => (32, SampleFormat::Float),
        };
        Ok(WavSpec {
            channels,
            sample_rate: buffer.sample_rate(),
            bits_per_sample,
            sample_format,
        })
    }
}

impl Encoder for WavEncoder {
    fn encode(&self, buffer: &PcmBuffer) -> Result<EncodedArtifact> {
        let spec = self.spec(buffer)?;
        let mut bytes = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).map_err(encode_err)?;
            for sample in buffer.to_interleaved() {
                let written = match self.format {
                    ExportFormat::Wav => writer.write_sample(to_i16(sample)),
                    ExportFormat::WavFloat => writer.write_sample(sample),
                };
                written.map_err(encode_err)?;
            }
            writer.finalize().map_err(encode_err)?;
        }

        tracing::debug!(
            format = %self.format,
            frames = buffer.len(),
            bytes = bytes.len(),
            "encoded"
        );
        Ok(EncodedArtifact {
            bytes,
            mime_type: self.format.mime_type().to_string(),
            format: self.format,
        })
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn encode_err(e: hound::Error) -> Error {
    Error::Encode(e.to_string())
}
