//! Tone configuration shared between the control plane and the generator
//!
//! The host writes a whole [`ToneConfig`] whenever its settings change; the
//! generator thread takes a copy at each waveform-cycle boundary. The store
//! never validates anything, that is left to whoever reads it.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Number of output channels (left, right)
pub const N_CHANNELS: usize = 2;

/// Sample rate the generator runs at until a valid configuration arrives
pub const DEFAULT_RATE: i32 = 48_000;

/// Generation parameters for one source
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneConfig {
    /// Tone frequency per channel in Hz
    pub freq: [i32; N_CHANNELS],
    /// Clock skew in parts per billion (positive = slow clock)
    pub skew_ppb: i32,
    /// Sample rate in Hz. Zero or negative means "not configured".
    pub rate: i32,
}

impl ToneConfig {
    /// Working configuration the generator starts from: silence at the
    /// default rate with no skew.
    pub fn seed() -> Self {
        Self {
            freq: [0; N_CHANNELS],
            skew_ppb: 0,
            rate: DEFAULT_RATE,
        }
    }

    /// Whether the generator may adopt this configuration
    pub fn is_usable(&self) -> bool {
        self.rate > 0
    }

    /// Skew expressed in parts per million, as shown to users
    pub fn skew_ppm(&self) -> f64 {
        f64::from(self.skew_ppb) * 1e-3
    }
}

/// Thread-safe holder of the live [`ToneConfig`]
///
/// Cloning the store yields another handle to the same value.
#[derive(Clone, Debug, Default)]
pub struct ConfigStore {
    inner: Arc<Mutex<ToneConfig>>,
}

impl ConfigStore {
    /// Create a store holding an unconfigured (all zero) value
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn set(&self, config: ToneConfig) {
        // A poisoned lock still holds a complete value: writes are a single copy.
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = config;
    }

    /// Copy out the current configuration
    pub fn snapshot(&self) -> ToneConfig {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
