//! Time-bounded slicing of PCM buffers.

use crate::buffer::PcmBuffer;
use crate::error::{Error, Result};

/// Half-open `[begin_ms, end_ms)` window in milliseconds.
///
/// `end_ms: None` runs to the end of the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub begin_ms: i64,
    pub end_ms: Option<i64>,
}

impl TimeRange {
    pub fn new(begin_ms: i64, end_ms: i64) -> Self {
        Self {
            begin_ms,
            end_ms: Some(end_ms),
        }
    }

    /// From `begin_ms` to the end of whatever buffer it is applied to.
    pub fn from_begin(begin_ms: i64) -> Self {
        Self {
            begin_ms,
            end_ms: None,
        }
    }

    /// `[0, ms)`.
    pub fn leading(ms: u64) -> Self {
        Self::new(0, i64::try_from(ms).unwrap_or(i64::MAX))
    }
}

/// Copy the frames covered by `range` into a new buffer.
///
/// Frame offsets are `floor(rate * ms / 1000)`. Bounds are validated before anything is
/// allocated; copy failures surface as [`Error::Slice`] and no partial buffer escapes.
pub fn slice(buffer: &PcmBuffer, range: TimeRange) -> Result<PcmBuffer> {
    let (start, end) = frame_window(buffer, range)?;
    let frames = end - start;

    let mut channels = Vec::with_capacity(buffer.channel_count());
    for (idx, ch) in buffer.channels().iter().enumerate() {
        let window = ch.get(start..end).ok_or_else(|| Error::Slice {
            channel: idx,
            reason: format!("window {start}..{end} outside {} frames", ch.len()),
        })?;
        let mut out = Vec::new();
        out.try_reserve_exact(frames).map_err(|e| Error::Slice {
            channel: idx,
            reason: e.to_string(),
        })?;
        out.extend_from_slice(window);
        channels.push(out);
    }

    PcmBuffer::new(buffer.sample_rate(), channels)
}

/// Validate `range` against `buffer` and convert it to `[start, end)` frame offsets.
fn frame_window(buffer: &PcmBuffer, range: TimeRange) -> Result<(usize, usize)> {
    let rate = buffer.sample_rate() as i128;
    let len = buffer.len() as i128;

    if range.begin_ms < 0 {
        return Err(Error::Range("begin time must be greater than 0".into()));
    }
    let begin = range.begin_ms as i128;

    let end_frame = match range.end_ms {
        Some(end_ms) => {
            let end = end_ms as i128;
            if end * rate > len * 1000 {
                return Err(Error::Range(format!(
                    "end time must be less than or equal to {}",
                    buffer.duration_secs()
                )));
            }
            if end < begin {
                return Err(Error::Range(
                    "end time must be greater than or equal to begin time".into(),
                ));
            }
            end * rate / 1000
        }
        None => len,
    };

    let start_frame = begin * rate / 1000;
    if start_frame > end_frame {
        return Err(Error::Range(format!(
            "begin time must be less than or equal to {}",
            buffer.duration_secs()
        )));
    }

    Ok((start_frame as usize, end_frame as usize))
}
