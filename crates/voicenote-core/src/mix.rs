//! Summing mixer for equal-rate PCM buffers.

use crate::buffer::PcmBuffer;
use crate::error::{Error, Result};

/// Mix two buffers into a fresh one.
///
/// The output has `max` of both channel counts and both lengths. A narrower input
/// reuses its channels cyclically (mono is broadcast to every output channel); a
/// shorter input contributes silence past its end. Sums are hard-clamped to `[-1, 1]`;
/// a non-finite sum (NaN or infinity from either input) becomes silence.
pub fn mix(a: &PcmBuffer, b: &PcmBuffer) -> Result<PcmBuffer> {
    if a.sample_rate() != b.sample_rate() {
        return Err(Error::SampleRateMismatch {
            left: a.sample_rate(),
            right: b.sample_rate(),
        });
    }

    let channel_count = a.channel_count().max(b.channel_count());
    let len = a.len().max(b.len());

    let channels: Vec<Vec<f32>> = (0..channel_count)
        .map(|c| {
            let left = source_channel(a, c);
            let right = source_channel(b, c);
            (0..len)
                .map(|i| {
                    let sum = left.get(i).copied().unwrap_or(0.0)
                        + right.get(i).copied().unwrap_or(0.0);
                    if sum.is_finite() {
                        sum.clamp(-1.0, 1.0)
                    } else {
                        0.0
                    }
                })
                .collect::<Vec<f32>>()
        })
        .collect();

    PcmBuffer::new(a.sample_rate(), channels)
}

/// Fold any number of buffers through [`mix`], left to right.
pub fn mix_all(buffers: &[PcmBuffer]) -> Result<PcmBuffer> {
    let (first, rest) = buffers.split_first().ok_or(Error::EmptyMix)?;
    rest.iter().try_fold(first.clone(), |acc, next| mix(&acc, next))
}

/// Channel of `buf` feeding output channel `c`.
fn source_channel(buf: &PcmBuffer, c: usize) -> &[f32] {
    let channels = buf.channels();
    &channels[c % channels.len()]
}
