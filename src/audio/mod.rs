//! Audio module - tone generation, pacing and playback
//!
//! This module provides:
//! - Frame descriptors and the sink trait frames are delivered through
//! - The abort event that doubles as the generator's pacing wait
//! - The skew-aware pacer
//! - The clocked generator thread
//! - A cpal playback engine for hearing the output

mod abort;
mod engine;
mod frame;
mod generator;
mod pacing;

// Re-export public types
pub use abort::{AbortEvent, WaitResult};
pub use engine::{PlaybackEngine, RingSink};
pub use frame::{AudioFormat, AudioSink, NullSink, SourceAudio};
pub use generator::{
    cycle_report, ClockedGenerator, CycleReport, GeneratorOptions, GeneratorState, SineSynth,
    FRAME_LEN, STARTUP_DELAY,
};
pub use pacing::{frame_duration_ns, now_ns, Pacer};
