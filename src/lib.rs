//! skewtone - asynchronous stereo test tone
//!
//! Synthesizes a two-channel sine wave on a background thread and delivers
//! fixed-size planar frames to a host sink at the cadence implied by the
//! sample rate, optionally skewed by a few parts per million to simulate a
//! drifting clock.
//!
//! ```no_run
//! use skewtone::{AsyncAudioSource, NullSink};
//!
//! let settings = AsyncAudioSource::defaults();
//! let source = AsyncAudioSource::create(&settings, NullSink::new())?;
//! // ... later, from any thread
//! source.update(&settings);
//! source.destroy();
//! # Ok::<(), skewtone::Error>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod settings;
pub mod source;

pub use audio::{AudioSink, NullSink, SourceAudio};
pub use config::{ConfigStore, ToneConfig};
pub use error::{Error, SettingsError};
pub use settings::Settings;
pub use source::AsyncAudioSource;
