//! Audio frames handed to the host
//!
//! A frame borrows the generator's buffers for the duration of a single
//! [`AudioSink::output_audio`] call. Sinks that need the samples later must
//! copy them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::N_CHANNELS;

/// Sample layout of a frame's buffers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    /// One contiguous `f32` buffer per channel
    FloatPlanar,
}

/// One block of audio as delivered to the host
#[derive(Clone, Copy, Debug)]
pub struct SourceAudio<'a> {
    /// Per-channel sample buffers, each `frames` long
    pub data: [&'a [f32]; N_CHANNELS],
    /// Samples per channel
    pub frames: usize,
    pub format: AudioFormat,
    pub samples_per_sec: u32,
    /// Presentation time of the first sample, in nanoseconds
    pub timestamp: u64,
}

impl SourceAudio<'_> {
    /// Number of channels (always stereo)
    pub fn speakers(&self) -> usize {
        N_CHANNELS
    }

    /// Samples of one channel
    pub fn channel(&self, ch: usize) -> &[f32] {
        self.data[ch]
    }
}

/// Receiver of generated audio
///
/// Called from the generator thread once per frame. Delivery is assumed to
/// succeed; blocking here delays the next frame.
pub trait AudioSink: Send + 'static {
    fn output_audio(&mut self, audio: &SourceAudio<'_>);
}

impl<F> AudioSink for F
where
    F: FnMut(&SourceAudio<'_>) + Send + 'static,
{
    fn output_audio(&mut self, audio: &SourceAudio<'_>) {
        self(audio)
    }
}

/// Sink that discards audio but keeps count of what it received
#[derive(Clone, Debug, Default)]
pub struct NullSink {
    frames: Arc<AtomicU64>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples per channel received so far, across all clones
    pub fn frames_received(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl AudioSink for NullSink {
    fn output_audio(&mut self, audio: &SourceAudio<'_>) {
        self.frames.fetch_add(audio.frames as u64, Ordering::Relaxed);
    }
}
