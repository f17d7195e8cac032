//! Planar PCM buffer passed between composition stages.
//!
//! Samples are stored **per channel** (`channels[c][frame]`), unlike the interleaved
//! layout used by the decoder and encoder. Every channel holds exactly `len()` frames.

use crate::error::{Error, Result};

/// Decoded audio: one `f32` array per channel at a fixed sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Build a buffer from planar channel data.
    ///
    /// Fails when the rate is zero, there are no channels, or channel lengths differ.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidBuffer("sample rate must be positive".into()));
        }
        let Some(first) = channels.first() else {
            return Err(Error::InvalidBuffer("at least one channel is required".into()));
        };
        let len = first.len();
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != len) {
            return Err(Error::InvalidBuffer(format!(
                "channel {idx} has {} frames, expected {len}",
                ch.len()
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// A zero-filled buffer.
    pub fn silence(sample_rate: u32, channel_count: usize, len: usize) -> Result<Self> {
        Self::new(sample_rate, vec![vec![0.0; len]; channel_count])
    }

    /// Split interleaved samples (`frame0[ch0], frame0[ch1], ...`) into channels.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        samples: &[f32],
    ) -> Result<Self> {
        if channel_count == 0 {
            return Err(Error::InvalidBuffer("at least one channel is required".into()));
        }
        let frames = samples.len() / channel_count;
        let mut channels: Vec<Vec<f32>> =
            (0..channel_count).map(|_| Vec::with_capacity(frames)).collect();
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::new(sample_rate, channels)
    }

    /// Interleave channels back into a single sample vector.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.channel_count());
        for i in 0..self.len() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, idx: usize) -> Option<&[f32]> {
        self.channels.get(idx).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Duration in seconds (`len / sample_rate`).
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Duration in whole milliseconds, rounded down.
    pub fn duration_ms(&self) -> u64 {
        (self.len() as u64).saturating_mul(1000) / self.sample_rate as u64
    }

    /// `true` when the buffer is strictly longer than `ms` milliseconds.
    ///
    /// Compared in integer frame units so a 5 s buffer is never "longer" than 5000 ms.
    pub fn exceeds_ms(&self, ms: u64) -> bool {
        (self.len() as u128) * 1000 > (ms as u128) * (self.sample_rate as u128)
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_ragged_channels() {
        let err = PcmBuffer::new(48_000, vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, Error::InvalidBuffer(_)));
    }

    #[test]
    fn new_rejects_zero_rate_and_no_channels() {
        assert!(PcmBuffer::new(0, vec![vec![0.0]]).is_err());
        assert!(PcmBuffer::new(48_000, Vec::new()).is_err());
    }

    #[test]
    fn zero_length_buffer_is_valid() {
        let buf = PcmBuffer::silence(44_100, 2, 0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.duration_ms(), 0);
    }

    #[test]
    fn interleave_round_trip_preserves_order() {
        let buf = PcmBuffer::from_interleaved(8_000, 2, &[0.1, -0.1, 0.2, -0.2, 0.3]).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.channel(0).unwrap(), &[0.1, 0.2]);
        assert_eq!(buf.channel(1).unwrap(), &[-0.1, -0.2]);
        assert_eq!(buf.to_interleaved(), vec![0.1, -0.1, 0.2, -0.2]);
    }

    #[test]
    fn duration_helpers() {
        let buf = PcmBuffer::silence(48_000, 1, 120_000).unwrap();
        assert_eq!(buf.duration_ms(), 2_500);
        assert!((buf.duration_secs() - 2.5).abs() < 1e-12);
        assert!(buf.exceeds_ms(2_499));
        assert!(!buf.exceeds_ms(2_500));
    }

    #[test]
    fn peak_tracks_absolute_max() {
        let buf = PcmBuffer::new(8_000, vec![vec![0.2, -0.7], vec![0.5, 0.1]]).unwrap();
        assert!((buf.peak() - 0.7).abs() < 1e-6);
    }
}
