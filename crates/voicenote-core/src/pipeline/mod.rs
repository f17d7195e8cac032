//! Composition pipeline wiring: decode both sources, mix, enforce the bound, slice, encode.
//!
//! Decoding runs on one background thread per source; everything after that is
//! synchronous on the caller's thread. The caller owns the returned [`Composition`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::RecvTimeoutError;
use voicenote_types::{CompositionStage, CompositionStatus};

use crate::buffer::PcmBuffer;
use crate::config::CompositionConfig;
use crate::decode::{AudioSource, Decoder, SymphoniaDecoder};
use crate::encode::{EncodedArtifact, Encoder, WavEncoder};
use crate::error::{Error, Result};
use crate::mix::mix;
use crate::slice::{TimeRange, slice};
use crate::status::PipelineStatusState;

/// Inputs of a single run.
#[derive(Clone, Debug)]
pub struct CompositionRequest {
    /// Preset sound effect.
    pub effect: AudioSource,
    /// Captured voice recording.
    pub recording: AudioSource,
    /// Upper bound of the artifact, in milliseconds.
    pub target_ms: u64,
}

/// Output of a successful run.
#[derive(Clone, Debug)]
pub struct Composition {
    pub artifact: EncodedArtifact,
    /// The sliced PCM the artifact was encoded from.
    pub buffer: PcmBuffer,
    /// Length of the slice in whole milliseconds, rounded down from the frame count.
    ///
    /// Can be one below `target_ms` when the target does not land on a frame boundary.
    pub duration_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SourceRole {
    Effect,
    Recording,
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRole::Effect => f.write_str("effect"),
            SourceRole::Recording => f.write_str("recording"),
        }
    }
}

/// Runs compositions one at a time against injected decode/encode capabilities.
pub struct CompositionPipeline {
    decoder: Arc<dyn Decoder>,
    encoder: Arc<dyn Encoder>,
    config: CompositionConfig,
    running: AtomicBool,
    status: Arc<Mutex<PipelineStatusState>>,
}

impl CompositionPipeline {
    pub fn new(
        decoder: Arc<dyn Decoder>,
        encoder: Arc<dyn Encoder>,
        config: CompositionConfig,
    ) -> Self {
        Self {
            decoder,
            encoder,
            config,
            running: AtomicBool::new(false),
            status: PipelineStatusState::shared(),
        }
    }

    /// Symphonia decoding and WAV export in the configured format.
    pub fn with_default_codecs(config: CompositionConfig) -> Self {
        let encoder = WavEncoder::new(config.export_format);
        Self::new(Arc::new(SymphoniaDecoder::new()), Arc::new(encoder), config)
    }

    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    /// Current (or last) stage of this pipeline.
    pub fn status(&self) -> CompositionStatus {
        match self.status.lock() {
            Ok(g) => g.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        }
    }

    /// Run one composition to `Ready` or `Failed`.
    ///
    /// Fails with [`Error::Busy`] if another run is in progress on this instance, and
    /// with [`Error::Cancelled`] once `cancel` is observed set.
    pub fn run(
        &self,
        request: CompositionRequest,
        cancel: Option<&AtomicBool>,
    ) -> Result<Composition> {
        let _guard = RunGuard::acquire(&self.running)?;
        let run_id = self.update(|s| s.begin_run(request.target_ms));
        tracing::info!(
            run_id,
            effect = %request.effect.name,
            recording = %request.recording.name,
            target_ms = request.target_ms,
            "composition started"
        );

        match self.run_stages(request, cancel) {
            Ok(composition) => {
                self.enter(CompositionStage::Ready);
                tracing::info!(
                    run_id,
                    duration_ms = composition.duration_ms,
                    peak = composition.buffer.peak(),
                    bytes = composition.artifact.bytes.len(),
                    "composition ready"
                );
                Ok(composition)
            }
            Err(e) => {
                let message = e.to_string();
                self.update(|s| {
                    s.stage = CompositionStage::Failed;
                    s.error = Some(message);
                });
                tracing::warn!(run_id, "composition failed: {e}");
                Err(e)
            }
        }
    }

    fn run_stages(
        &self,
        request: CompositionRequest,
        cancel: Option<&AtomicBool>,
    ) -> Result<Composition> {
        let target_ms = request.target_ms;
        let (effect, recording) = self.decode_both(request.effect, request.recording, cancel)?;
        check_cancel(cancel)?;

        self.enter(CompositionStage::Mixing);
        let merged = mix(&effect, &recording)?;
        drop((effect, recording));
        let merged_ms = merged.duration_ms();
        self.update(|s| s.merged_ms = Some(merged_ms));
        check_cancel(cancel)?;

        self.enter(CompositionStage::DurationCheck);
        if !merged.exceeds_ms(target_ms) {
            return Err(Error::DurationPolicy {
                merged_ms,
                target_ms,
            });
        }

        self.enter(CompositionStage::Slicing);
        let sliced = slice(&merged, TimeRange::leading(target_ms))?;
        drop(merged);
        check_cancel(cancel)?;

        self.enter(CompositionStage::Encoding);
        let artifact = self.encoder.encode(&sliced)?;
        check_cancel(cancel)?;

        Ok(Composition {
            artifact,
            duration_ms: sliced.duration_ms(),
            buffer: sliced,
        })
    }

    /// Decode both sources concurrently and wait for both results.
    ///
    /// The first failure ends the wait; the sibling thread finishes on its own and its
    /// result is dropped with the channel.
    fn decode_both(
        &self,
        effect: AudioSource,
        recording: AudioSource,
        cancel: Option<&AtomicBool>,
    ) -> Result<(PcmBuffer, PcmBuffer)> {
        let (tx, rx) = crossbeam_channel::bounded::<(SourceRole, Result<PcmBuffer>)>(2);

        for (role, source) in [(SourceRole::Effect, effect), (SourceRole::Recording, recording)] {
            let decoder = self.decoder.clone();
            let tx = tx.clone();
            thread::Builder::new()
                .name(format!("decode-{role}"))
                .spawn(move || {
                    let result = decoder.decode(&source);
                    let _ = tx.send((role, result));
                })?;
        }
        drop(tx);

        let mut effect_buf = None;
        let mut recording_buf = None;
        while effect_buf.is_none() || recording_buf.is_none() {
            check_cancel(cancel)?;
            match rx.recv_timeout(self.config.decode_poll_interval) {
                Ok((role, Ok(buffer))) => {
                    tracing::debug!(
                        %role,
                        rate_hz = buffer.sample_rate(),
                        channels = buffer.channel_count(),
                        frames = buffer.len(),
                        "source decoded"
                    );
                    match role {
                        SourceRole::Effect => effect_buf = Some(buffer),
                        SourceRole::Recording => recording_buf = Some(buffer),
                    }
                }
                Ok((role, Err(e))) => {
                    tracing::warn!(%role, "decode failed: {e}");
                    return Err(e);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::decode(
                        "pipeline",
                        "decoder thread exited without a result",
                    ));
                }
            }
        }

        match (effect_buf, recording_buf) {
            (Some(e), Some(r)) => Ok((e, r)),
            _ => Err(Error::decode("pipeline", "missing decoded source")),
        }
    }

    fn enter(&self, stage: CompositionStage) {
        let run_id = self.update(|s| {
            s.stage = stage;
            s.run_id
        });
        tracing::debug!(run_id, ?stage, "stage");
    }

    fn update<T>(&self, f: impl FnOnce(&mut PipelineStatusState) -> T) -> T {
        match self.status.lock() {
            Ok(mut g) => f(&mut g),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<()> {
    if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Holds the single-run flag for the lifetime of a run.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    use crossbeam_channel::Receiver;
    use voicenote_types::ExportFormat;

    struct FakeDecoder {
        buffers: HashMap<String, PcmBuffer>,
        gate: Option<Receiver<()>>,
    }

    impl FakeDecoder {
        fn new(buffers: Vec<(&str, PcmBuffer)>) -> Self {
            Self {
                buffers: buffers.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                gate: None,
            }
        }

        fn gated(mut self, gate: Receiver<()>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    impl Decoder for FakeDecoder {
        fn decode(&self, source: &AudioSource) -> Result<PcmBuffer> {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            self.buffers
                .get(&source.name)
                .cloned()
                .ok_or_else(|| Error::decode(&source.name, "unsupported container"))
        }
    }

    struct FrameCountEncoder;

    impl Encoder for FrameCountEncoder {
        fn encode(&self, buffer: &PcmBuffer) -> Result<EncodedArtifact> {
            Ok(EncodedArtifact {
                bytes: (buffer.len() as u64).to_le_bytes().to_vec(),
                mime_type: "audio/test".to_string(),
                format: ExportFormat::Wav,
            })
        }
    }

    fn constant(rate: u32, secs: usize, value: f32) -> PcmBuffer {
        PcmBuffer::new(rate, vec![vec![value; rate as usize * secs]]).unwrap()
    }

    fn pipeline(decoder: FakeDecoder) -> CompositionPipeline {
        CompositionPipeline::new(
            Arc::new(decoder),
            Arc::new(FrameCountEncoder),
            CompositionConfig {
                decode_poll_interval: Duration::from_millis(5),
                ..CompositionConfig::default()
            },
        )
    }

    fn standard_decoder() -> FakeDecoder {
        FakeDecoder::new(vec![
            ("effect", constant(48_000, 2, 0.25)),
            ("recording", constant(48_000, 5, 0.5)),
        ])
    }

    fn request(target_ms: u64) -> CompositionRequest {
        CompositionRequest {
            effect: AudioSource::from_bytes("effect", vec![1]),
            recording: AudioSource::from_bytes("recording", vec![2]),
            target_ms,
        }
    }

    fn wait_for_stage(pipeline: &CompositionPipeline, stage: CompositionStage) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.status().stage != stage {
            assert!(Instant::now() < deadline, "stage {stage:?} never reached");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn merged_duration_equal_to_target_is_a_policy_failure() {
        let p = pipeline(standard_decoder());
        match p.run(request(5_000), None) {
            Err(Error::DurationPolicy { merged_ms, target_ms }) => {
                assert_eq!((merged_ms, target_ms), (5_000, 5_000));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let status = p.status();
        assert_eq!(status.stage, CompositionStage::Failed);
        assert_eq!(status.merged_ms, Some(5_000));
        assert!(status.error.is_some());
    }

    #[test]
    fn merged_duration_above_target_is_sliced_to_target() {
        let p = pipeline(standard_decoder());
        let out = p.run(request(3_000), None).unwrap();
        assert_eq!(out.buffer.len(), 144_000);
        assert_eq!(out.buffer.channel_count(), 1);
        assert_eq!(out.buffer.sample_rate(), 48_000);
        assert_eq!(out.duration_ms, 3_000);
        assert_eq!(out.artifact.mime_type, "audio/test");
        assert_eq!(out.artifact.bytes, 144_000u64.to_le_bytes().to_vec());
        assert_eq!(p.status().stage, CompositionStage::Ready);
    }

    #[test]
    fn reported_duration_is_the_floored_slice_length() {
        let decoder = FakeDecoder::new(vec![
            ("effect", constant(44_100, 1, 0.1)),
            ("recording", constant(44_100, 2, 0.1)),
        ]);
        let out = pipeline(decoder).run(request(1_001), None).unwrap();
        assert_eq!(out.buffer.len(), 44_144);
        assert_eq!(out.duration_ms, 1_000);
    }

    #[test]
    fn sliced_output_carries_the_mix() {
        let p = pipeline(standard_decoder());
        let out = p.run(request(3_000), None).unwrap();
        let ch = out.buffer.channel(0).unwrap();
        assert!((ch[0] - 0.75).abs() < 1e-6);
        assert!((ch[95_999] - 0.75).abs() < 1e-6);
        assert!((ch[96_000] - 0.5).abs() < 1e-6);
        assert!((out.buffer.peak() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn recording_decode_failure_fails_the_run() {
        let decoder = FakeDecoder::new(vec![("effect", constant(48_000, 2, 0.25))]);
        let p = pipeline(decoder);
        match p.run(request(3_000), None) {
            Err(Error::Decode { source_name, .. }) => assert_eq!(source_name, "recording"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(p.status().stage, CompositionStage::Failed);
    }

    #[test]
    fn rate_mismatch_surfaces_unchanged() {
        let decoder = FakeDecoder::new(vec![
            ("effect", constant(44_100, 2, 0.1)),
            ("recording", constant(48_000, 5, 0.1)),
        ]);
        let p = pipeline(decoder);
        assert!(matches!(
            p.run(request(3_000), None),
            Err(Error::SampleRateMismatch { left: 44_100, right: 48_000 })
        ));
    }

    #[test]
    fn concurrent_run_is_rejected_as_busy() {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let p = Arc::new(pipeline(standard_decoder().gated(gate_rx)));

        let runner = p.clone();
        let handle = thread::spawn(move || runner.run(request(3_000), None));
        wait_for_stage(&p, CompositionStage::Decoding);

        assert!(matches!(p.run(request(3_000), None), Err(Error::Busy)));
        assert_eq!(p.status().run_id, 1);

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        let out = handle.join().unwrap().unwrap();
        assert_eq!(out.buffer.len(), 144_000);
    }

    #[test]
    fn cancelled_run_fails_and_releases_the_pipeline() {
        let p = pipeline(standard_decoder());
        let cancel = AtomicBool::new(true);
        assert!(matches!(p.run(request(3_000), Some(&cancel)), Err(Error::Cancelled)));
        assert_eq!(p.status().stage, CompositionStage::Failed);

        cancel.store(false, Ordering::Relaxed);
        assert!(p.run(request(3_000), Some(&cancel)).is_ok());
        assert_eq!(p.status().run_id, 2);
    }

    #[test]
    fn cancel_while_decoding_abandons_the_run() {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let p = Arc::new(pipeline(standard_decoder().gated(gate_rx)));
        let cancel = Arc::new(AtomicBool::new(false));

        let runner = p.clone();
        let flag = cancel.clone();
        let handle = thread::spawn(move || runner.run(request(3_000), Some(flag.as_ref())));
        wait_for_stage(&p, CompositionStage::Decoding);
        cancel.store(true, Ordering::Relaxed);

        assert!(matches!(handle.join().unwrap(), Err(Error::Cancelled)));
        drop(gate_tx);
    }

    #[test]
    fn default_codecs_round_trip_real_wav() {
        let wav = WavEncoder::new(ExportFormat::WavFloat);
        let effect = wav.encode(&constant(8_000, 1, 0.25)).unwrap();
        let recording = wav.encode(&constant(8_000, 3, 0.25)).unwrap();

        let p = CompositionPipeline::with_default_codecs(CompositionConfig {
            export_format: ExportFormat::WavFloat,
            ..CompositionConfig::default()
        });
        let out = p
            .run(
                CompositionRequest {
                    effect: AudioSource::from_bytes("effect.wav", effect.bytes),
                    recording: AudioSource::from_bytes("recording.wav", recording.bytes),
                    target_ms: 2_000,
                },
                None,
            )
            .unwrap();

        assert_eq!(out.duration_ms, 2_000);
        let decoded = SymphoniaDecoder::new()
            .decode(&AudioSource::from_bytes("out", out.artifact.bytes))
            .unwrap();
        assert_eq!(decoded.len(), 16_000);
        assert!((decoded.channel(0).unwrap()[0] - 0.5).abs() < 1e-6);
        assert!((decoded.channel(0).unwrap()[8_000] - 0.25).abs() < 1e-6);
    }
}
