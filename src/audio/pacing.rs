//! Skew-aware frame pacing
//!
//! The pacer keeps a virtual "last sent" timestamp that advances by one
//! frame's worth of nanoseconds per emitted frame, scaled by
//! `(1e9 - skew_ppb) / 1e9`. The fractional nanoseconds left over by the
//! integer division are carried into the next frame so the schedule never
//! drifts from truncation.
//!
//! With positive skew each frame accounts for fewer virtual nanoseconds than
//! it nominally lasts, so the virtual schedule falls behind the audio it
//! describes (a slow clock). Negative skew does the opposite.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Nanoseconds on a monotonic clock shared by the whole process
pub fn now_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Nominal duration of `frames` samples at `rate`, truncated to whole ns
pub fn frame_duration_ns(frames: usize, rate: u32) -> u64 {
    frames as u64 * NANOS_PER_SEC / u64::from(rate.max(1))
}

/// Virtual output clock of one generator
#[derive(Clone, Debug, Default)]
pub struct Pacer {
    first_sent: Option<u64>,
    last_sent: u64,
    /// Sub-nanosecond carry, always `< rate` of the last advance
    rem: u64,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock time of the first emitted frame
    pub fn first_sent(&self) -> Option<u64> {
        self.first_sent
    }

    /// Virtual timestamp of the most recent emission
    pub fn last_sent(&self) -> u64 {
        self.last_sent
    }

    /// Virtual nanoseconds scheduled since the first frame
    pub fn scheduled_ns(&self) -> u64 {
        self.first_sent.map_or(0, |first| self.last_sent - first)
    }

    /// Record that a frame of `frames` samples was emitted at `now` and
    /// return how long to wait before producing the next one.
    ///
    /// The first frame only anchors the clock and waits one nominal frame.
    /// Afterwards the wait shrinks to zero whenever production is running
    /// behind the virtual schedule; there is no catch-up batching.
    pub fn frame_sent(&mut self, now: u64, frames: usize, rate: u32, skew_ppb: i32) -> Duration {
        let rate = u64::from(rate.max(1));
        let frame_ns = frames as u64 * NANOS_PER_SEC / rate;

        let wait_ns = match self.first_sent {
            None => {
                self.first_sent = Some(now);
                self.last_sent = now;
                frame_ns
            }
            Some(_) => {
                // Skew past +1e9 ppb would run the clock backwards; stop it instead.
                let per_sample = (NANOS_PER_SEC as i64 - i64::from(skew_ppb)).max(0) as u64;
                let x = frames as u64 * per_sample + self.rem;
                self.last_sent += x / rate;
                self.rem = x % rate;
                (self.last_sent + frame_ns).saturating_sub(now)
            }
        };

        Duration::from_millis(wait_ns / NANOS_PER_MILLI)
    }
}
