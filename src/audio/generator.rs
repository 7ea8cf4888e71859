//! Clocked sine generator
//!
//! A dedicated thread synthesizes fixed-size stereo frames and hands them to
//! an [`AudioSink`], pacing itself with a [`Pacer`] so that frames leave at
//! the (optionally skewed) rate implied by the sample rate.
//!
//! ## Threading
//!
//! - Control plane: writes [`ToneConfig`] values into the [`ConfigStore`]
//! - Generator thread: owns the phase, pacing state and frame buffer
//!
//! The generator reads the store only when its phase index wraps to zero,
//! so a new frequency or rate never lands in the middle of a waveform cycle.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::abort::{AbortEvent, WaitResult};
use super::frame::{AudioFormat, AudioSink, SourceAudio};
use super::pacing::{frame_duration_ns, now_ns, Pacer};
use crate::config::{ConfigStore, ToneConfig, N_CHANNELS};
use crate::error::Error;

/// Samples per channel in each frame
pub const FRAME_LEN: usize = 128;

/// Delay before the first frame is produced
pub const STARTUP_DELAY: Duration = Duration::from_millis(500);

/// Generator tunables
#[derive(Clone, Copy, Debug)]
pub struct GeneratorOptions {
    pub frame_len: usize,
    pub startup_delay: Duration,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            frame_len: FRAME_LEN,
            startup_delay: STARTUP_DELAY,
        }
    }
}

/// Lifecycle of a generator thread
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GeneratorState {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl GeneratorState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Phase accumulator with a reusable planar frame buffer
pub struct SineSynth {
    /// Working configuration, replaced only at `t == 0`
    cfg: ToneConfig,
    /// Sample index within the current waveform cycle, in `[0, rate)`
    t: i32,
    frame_len: usize,
    /// `frame_len` samples per channel, channel after channel
    buffer: Vec<f32>,
}

impl SineSynth {
    pub fn new(frame_len: usize) -> Self {
        Self {
            cfg: ToneConfig::seed(),
            t: 0,
            frame_len,
            buffer: vec![0.0; frame_len * N_CHANNELS],
        }
    }

    pub fn config(&self) -> &ToneConfig {
        &self.cfg
    }

    /// Current sample index within the waveform cycle
    pub fn position(&self) -> i32 {
        self.t
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.buffer[ch * self.frame_len..(ch + 1) * self.frame_len]
    }

    /// Fill the frame buffer with the next `frame_len` samples.
    ///
    /// Every time the phase index is at zero the store is consulted; its value
    /// is adopted only when the rate is positive.
    pub fn render(&mut self, store: &ConfigStore) {
        for i in 0..self.frame_len {
            if self.t == 0 {
                let next = store.snapshot();
                if next.is_usable() {
                    self.cfg = next;
                }
            }

            let rate = f64::from(self.cfg.rate);
            for ch in 0..N_CHANNELS {
                let phase = TAU * f64::from(self.t) * f64::from(self.cfg.freq[ch]) / rate;
                self.buffer[ch * self.frame_len + i] = phase.sin() as f32;
            }

            self.t += 1;
            if self.t >= self.cfg.rate {
                self.t = 0;
            }
        }
    }

    /// Describe the rendered frame for the sink
    pub fn frame(&self, timestamp: u64) -> SourceAudio<'_> {
        SourceAudio {
            data: [self.channel(0), self.channel(1)],
            frames: self.frame_len,
            format: AudioFormat::FloatPlanar,
            samples_per_sec: self.sample_rate(),
            timestamp,
        }
    }

    fn sample_rate(&self) -> u32 {
        // the working configuration always has a positive rate
        self.cfg.rate.unsigned_abs()
    }

    fn release(&mut self) {
        self.buffer = Vec::new();
    }
}

/// Drift record emitted once per waveform cycle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReport {
    /// Audio delivered so far, at the working rate
    pub audio_secs: f64,
    /// Wall-clock time since the first frame
    pub elapsed_secs: f64,
    pub skew_ppm: f64,
}

/// Report for the frame just rendered by `synth`, if that frame crossed
/// the end of a waveform cycle.
///
/// `n_output` counts samples per channel delivered including this frame.
pub fn cycle_report(synth: &SineSynth, n_output: u64, elapsed_ns: u64) -> Option<CycleReport> {
    if synth.position() as usize >= synth.frame_len() {
        return None;
    }

    let cfg = synth.config();
    Some(CycleReport {
        audio_secs: n_output as f64 / f64::from(synth.sample_rate()),
        elapsed_secs: elapsed_ns as f64 * 1e-9,
        skew_ppm: cfg.skew_ppm(),
    })
}

/// State owned by the generator thread
struct GeneratorThread<S: AudioSink> {
    store: ConfigStore,
    sink: S,
    abort: AbortEvent,
    state: Arc<AtomicU8>,
    synth: SineSynth,
    pacer: Pacer,
    /// Samples per channel delivered so far
    n_output: u64,
    startup_delay: Duration,
}

impl<S: AudioSink> GeneratorThread<S> {
    fn run(mut self) {
        log::debug!("Generator thread started");
        self.set_state(GeneratorState::Running);

        let mut timeout = self.startup_delay;
        while self.abort.timed_wait(timeout) == WaitResult::TimedOut {
            timeout = self.produce_frame();
        }

        self.set_state(GeneratorState::Stopping);
        self.synth.release();
        let state = Arc::clone(&self.state);
        drop(self);

        state.store(GeneratorState::Stopped as u8, Ordering::Release);
        log::debug!("Generator thread finished");
    }

    fn set_state(&self, state: GeneratorState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Synthesize and deliver one frame, returning the wait before the next.
    fn produce_frame(&mut self) -> Duration {
        self.synth.render(&self.store);

        let cfg = *self.synth.config();
        let rate = self.synth.sample_rate();
        let frame_len = self.synth.frame_len();

        let cur = now_ns();
        let frame_ns = frame_duration_ns(frame_len, rate);
        // Stamp the frame as having started one frame ago: it is only
        // delivered once fully computed.
        let audio = self.synth.frame(cur.saturating_sub(frame_ns));
        self.sink.output_audio(&audio);
        self.n_output += frame_len as u64;

        let elapsed_ns = cur - self.pacer.first_sent().unwrap_or(cur);
        if let Some(report) = cycle_report(&self.synth, self.n_output, elapsed_ns) {
            log::info!(
                "output {:.3} seconds audio, took {:.3} seconds, skew={}[ppm]",
                report.audio_secs,
                report.elapsed_secs,
                report.skew_ppm
            );
        }

        self.pacer.frame_sent(cur, frame_len, rate, cfg.skew_ppb)
    }
}

/// Handle to a running generator thread
///
/// Dropping the handle stops the thread and waits for it to exit.
pub struct ClockedGenerator {
    abort: AbortEvent,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl ClockedGenerator {
    /// Start generating into `sink` using configurations from `store`.
    pub fn spawn<S: AudioSink>(
        store: ConfigStore,
        sink: S,
        options: GeneratorOptions,
    ) -> Result<Self, Error> {
        let abort = AbortEvent::new();
        let state = Arc::new(AtomicU8::new(GeneratorState::Starting as u8));

        let worker = GeneratorThread {
            store,
            sink,
            abort: abort.clone(),
            state: Arc::clone(&state),
            synth: SineSynth::new(options.frame_len.max(1)),
            pacer: Pacer::new(),
            n_output: 0,
            startup_delay: options.startup_delay,
        };

        let handle = thread::Builder::new()
            .name("skewtone-gen".into())
            .spawn(move || worker.run())
            .map_err(Error::Spawn)?;

        Ok(Self {
            abort,
            state,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> GeneratorState {
        GeneratorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.abort.signal();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Generator thread panicked");
                self.state
                    .store(GeneratorState::Stopped as u8, Ordering::Release);
            }
        }
    }
}

impl Drop for ClockedGenerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    fn expected(t: i64, freq: i32, rate: i32) -> f32 {
        let t = t % i64::from(rate);
        (TAU * t as f64 * f64::from(freq) / f64::from(rate)).sin() as f32
    }

    fn store_with(freq: [i32; 2], rate: i32) -> ConfigStore {
        let store = ConfigStore::new();
        store.set(ToneConfig {
            freq,
            skew_ppb: 0,
            rate,
        });
        store
    }

    #[test]
    fn test_phase_continuous_across_frames() {
        let store = store_with([442, 1000], 48_000);
        let mut synth = SineSynth::new(128);

        for frame in 0..10i64 {
            synth.render(&store);
            for i in 0..128 {
                let t = frame * 128 + i as i64;
                assert_eq!(synth.channel(0)[i], expected(t, 442, 48_000));
                assert_eq!(synth.channel(1)[i], expected(t, 1000, 48_000));
            }
        }
        assert_eq!(synth.position(), 1280);
    }

    #[test]
    fn test_phase_wraps_at_rate() {
        // 1000 is not a multiple of 128, so wraps land mid-frame
        let store = store_with([250, 250], 1000);
        let mut synth = SineSynth::new(128);

        for frame in 0..20i64 {
            synth.render(&store);
            for i in 0..128 {
                let t = frame * 128 + i as i64;
                assert_eq!(synth.channel(0)[i], expected(t, 250, 1000));
            }
            assert!(synth.position() < 1000);
        }
        assert_eq!(synth.position(), (20 * 128 % 1000) as i32);
    }

    #[test]
    fn test_update_mid_cycle_waits_for_wrap() {
        let store = store_with([100, 100], 1000);
        let mut synth = SineSynth::new(128);
        synth.render(&store);
        assert_eq!(synth.position(), 128);

        let next = ToneConfig {
            freq: [300, 400],
            skew_ppb: 5,
            rate: 2000,
        };
        store.set(next);

        // Still the old configuration until t returns to zero
        synth.render(&store);
        assert_eq!(synth.config().freq, [100, 100]);
        for i in 0..128 {
            assert_eq!(synth.channel(0)[i], expected(128 + i as i64, 100, 1000));
        }

        // Frames 2..7 stay in the first cycle; frame 7 covers t = 896..1023
        for _ in 2..7 {
            synth.render(&store);
            assert_eq!(synth.config().rate, 1000);
        }
        synth.render(&store);
        assert_eq!(*synth.config(), next);

        // Samples after the wrap (t = 0 at index 104) use the new values
        assert_eq!(synth.channel(0)[103], expected(999, 100, 1000));
        assert_eq!(synth.channel(0)[104], expected(0, 300, 2000));
        assert_eq!(synth.channel(1)[105], expected(1, 400, 2000));
        assert_eq!(synth.position(), 24);
    }

    #[test]
    fn test_repeated_identical_updates_keep_phase() {
        let store = store_with([442, 442], 48_000);
        let reference_store = store.clone();
        let mut synth = SineSynth::new(128);
        let mut reference = SineSynth::new(128);

        for _ in 0..50 {
            store.set(store.snapshot());
            synth.render(&store);
            reference.render(&reference_store);
            assert_eq!(synth.position(), reference.position());
            assert_eq!(synth.channel(0), reference.channel(0));
        }
    }

    #[test]
    fn test_unconfigured_store_uses_seed() {
        let store = ConfigStore::new();
        let mut synth = SineSynth::new(128);

        for _ in 0..400 {
            synth.render(&store);
            assert!(synth.channel(0).iter().all(|s| *s == 0.0));
        }
        assert_eq!(synth.config().rate, 48_000);
        let audio = synth.frame(0);
        assert_eq!(audio.samples_per_sec, 48_000);
        assert_eq!(audio.frames, 128);
        assert_eq!(audio.format, AudioFormat::FloatPlanar);
    }

    #[test]
    fn test_cycle_report_fires_on_wrap_frames() {
        let store = ConfigStore::new();
        store.set(ToneConfig {
            freq: [250, 250],
            skew_ppb: 2_500,
            rate: 1000,
        });
        let mut synth = SineSynth::new(128);

        let mut fired = Vec::new();
        let mut n_output = 0u64;
        for frame in 0..50u64 {
            synth.render(&store);
            n_output += 128;
            // pretend each frame took 10 ms of wall-clock time
            let elapsed_ns = frame * 10_000_000;
            if let Some(report) = cycle_report(&synth, n_output, elapsed_ns) {
                fired.push(frame);
                if frame == 7 {
                    assert!((report.audio_secs - 1.024).abs() < 1e-12);
                    assert!((report.elapsed_secs - 0.07).abs() < 1e-12);
                    assert!((report.skew_ppm - 2.5).abs() < 1e-12);
                }
            }
        }

        // frames whose samples include t = 999 -> 0
        assert_eq!(fired, vec![7, 15, 23, 31, 39, 46]);
    }

    #[test]
    fn test_cycle_report_on_exact_boundary() {
        // 1024 = 8 * 128, so the wrap lands exactly at a frame boundary
        let store = store_with([1, 1], 1024);
        let mut synth = SineSynth::new(128);
        for frame in 0..16 {
            synth.render(&store);
            let report = cycle_report(&synth, (frame + 1) * 128, 0);
            assert_eq!(report.is_some(), frame == 7 || frame == 15);
        }
        assert_eq!(synth.position(), 0);
    }

    #[test]
    fn test_invalid_rate_is_ignored() {
        let store = store_with([442, 442], 1000);
        let mut synth = SineSynth::new(100);
        synth.render(&store);

        store.set(ToneConfig {
            freq: [1, 1],
            skew_ppb: 0,
            rate: 0,
        });
        // run through several wraps
        for _ in 0..30 {
            synth.render(&store);
        }
        assert_eq!(synth.config().freq, [442, 442]);
        assert_eq!(synth.config().rate, 1000);

        store.set(ToneConfig {
            freq: [1, 1],
            skew_ppb: 0,
            rate: -48_000,
        });
        for _ in 0..30 {
            synth.render(&store);
        }
        assert_eq!(synth.config().rate, 1000);
    }

    struct Captured {
        left: Vec<f32>,
        rate: u32,
        timestamp: u64,
    }

    fn channel_sink() -> (impl AudioSink, mpsc::Receiver<Captured>) {
        let (tx, rx) = mpsc::channel();
        let sink = move |audio: &SourceAudio<'_>| {
            let _ = tx.send(Captured {
                left: audio.channel(0).to_vec(),
                rate: audio.samples_per_sec,
                timestamp: audio.timestamp,
            });
        };
        (sink, rx)
    }

    fn quick_start(frame_len: usize) -> GeneratorOptions {
        GeneratorOptions {
            frame_len,
            startup_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_thread_delivers_continuous_frames() {
        let store = store_with([442, 442], 48_000);
        let (sink, rx) = channel_sink();
        let generator = ClockedGenerator::spawn(store, sink, quick_start(128)).unwrap();

        let mut frames = Vec::new();
        for _ in 0..10 {
            frames.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        assert_eq!(generator.state(), GeneratorState::Running);
        generator.stop();

        for (n, frame) in frames.iter().enumerate() {
            assert_eq!(frame.rate, 48_000);
            for (i, s) in frame.left.iter().enumerate() {
                assert_eq!(*s, expected((n * 128 + i) as i64, 442, 48_000));
            }
        }
        for pair in frames.windows(2) {
            assert!(pair[1].timestamp >= pair[0].timestamp);
        }
    }

    #[test]
    fn test_thread_paces_output() {
        let store = store_with([442, 442], 48_000);
        let (sink, rx) = channel_sink();
        // 480 samples = 10 ms per frame
        let generator = ClockedGenerator::spawn(store, sink, quick_start(480)).unwrap();

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let start = Instant::now();
        for _ in 0..9 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(50));
        generator.stop();
    }

    #[test]
    fn test_stop_during_startup_wait() {
        let store = store_with([442, 442], 48_000);
        let (sink, rx) = channel_sink();
        let options = GeneratorOptions {
            frame_len: 128,
            startup_delay: Duration::from_secs(30),
        };
        let generator = ClockedGenerator::spawn(store, sink, options).unwrap();

        let start = Instant::now();
        generator.stop();
        assert!(start.elapsed() < Duration::from_secs(5));

        // The sink was dropped with the thread and never received a frame
        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected)));
    }

    #[test]
    fn test_no_frames_after_stop() {
        let store = store_with([442, 442], 48_000);
        let (sink, rx) = channel_sink();
        let generator = ClockedGenerator::spawn(store, sink, quick_start(128)).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let state = Arc::clone(&generator.state);
        generator.stop();
        assert_eq!(
            GeneratorState::from_u8(state.load(Ordering::Acquire)),
            GeneratorState::Stopped
        );

        // Whatever was queued before the join is finite; then the channel closes.
        let _ = rx.try_iter().count();
        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected)));
    }

    #[test]
    fn test_drop_joins_thread() {
        let store = store_with([442, 442], 48_000);
        let (sink, rx) = channel_sink();
        {
            let _generator = ClockedGenerator::spawn(store, sink, quick_start(128)).unwrap();
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        let _ = rx.try_iter().count();
        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected)));
    }

    /// Sink that reports the wall-clock time each delivery started
    fn timing_sink() -> (impl AudioSink, mpsc::Receiver<u64>) {
        let (tx, rx) = mpsc::channel();
        let sink = move |_: &SourceAudio<'_>| {
            let _ = tx.send(now_ns());
        };
        (sink, rx)
    }

    #[test]
    fn test_stop_interrupts_paced_wait() {
        let store = store_with([442, 442], 48_000);
        let (sink, rx) = timing_sink();
        // one-second frames: after the first frame the thread waits ~1 s
        let generator = ClockedGenerator::spawn(store, sink, quick_start(48_000)).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let signaled_at = now_ns();
        let start = Instant::now();
        generator.stop();
        assert!(start.elapsed() < Duration::from_millis(200));

        // nothing was in flight, so nothing may start after the signal
        let late: Vec<u64> = rx.try_iter().filter(|t| *t > signaled_at).collect();
        assert!(late.is_empty(), "frames delivered after stop: {:?}", late);
    }

    #[test]
    fn test_at_most_one_frame_after_signal() {
        let store = store_with([442, 442], 48_000);
        let (sink, rx) = timing_sink();
        let generator = ClockedGenerator::spawn(store, sink, quick_start(128)).unwrap();
        for _ in 0..5 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        let state = Arc::clone(&generator.state);
        let signaled_at = now_ns();
        generator.stop();

        // Only a frame already being produced when the signal arrived may finish
        let after = rx.try_iter().filter(|t| *t > signaled_at).count();
        assert!(after <= 1, "{} frames delivered after stop", after);

        // Buffer and sink are released before stop() returns
        assert_eq!(
            GeneratorState::from_u8(state.load(Ordering::Acquire)),
            GeneratorState::Stopped
        );
        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected)));
    }
}
