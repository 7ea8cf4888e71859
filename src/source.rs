//! Asynchronous test audio source
//!
//! The host-facing lifecycle: create a source from settings, push updated
//! settings at any time, and destroy it. Destruction stops the generator
//! thread and waits for it.

use crate::audio::{AudioSink, ClockedGenerator, GeneratorOptions, GeneratorState};
use crate::config::{ConfigStore, ToneConfig};
use crate::error::Error;
use crate::settings::{self, Locale, Property, Settings};

/// Identifier hosts register the source under
pub const SOURCE_ID: &str = "asynchronous-audio-source";

/// A running sine-tone source
pub struct AsyncAudioSource {
    store: ConfigStore,
    generator: ClockedGenerator,
}

impl AsyncAudioSource {
    /// Display name, looked up through `locale`
    pub fn name(locale: &dyn Locale) -> &str {
        locale.text("Asynchronous Test Audio")
    }

    /// Settings pre-populated with the source's defaults
    pub fn defaults() -> Settings {
        let mut settings = Settings::new();
        settings.apply_defaults();
        settings
    }

    /// Configurable parameters for the host's property panel
    pub fn properties(locale: &dyn Locale) -> Vec<Property> {
        settings::properties(locale)
    }

    /// Create a source with default generator options.
    pub fn create<S: AudioSink>(settings: &Settings, sink: S) -> Result<Self, Error> {
        Self::with_options(settings, sink, GeneratorOptions::default())
    }

    /// Create a source and start its generator thread.
    ///
    /// On failure nothing is left running.
    pub fn with_options<S: AudioSink>(
        settings: &Settings,
        sink: S,
        options: GeneratorOptions,
    ) -> Result<Self, Error> {
        let store = ConfigStore::new();
        store.set(settings.to_config());

        let generator = ClockedGenerator::spawn(store.clone(), sink, options).map_err(|e| {
            log::error!("Source creation failed: {}", e);
            e
        })?;

        Ok(Self { store, generator })
    }

    /// Apply new settings; the generator picks them up at its next cycle.
    pub fn update(&self, settings: &Settings) {
        self.store.set(settings.to_config());
    }

    /// The configuration most recently stored by [`update`](Self::update)
    pub fn config(&self) -> ToneConfig {
        self.store.snapshot()
    }

    pub fn state(&self) -> GeneratorState {
        self.generator.state()
    }

    /// Stop the generator and wait for its thread to exit.
    pub fn destroy(self) {
        self.generator.stop();
    }
}
