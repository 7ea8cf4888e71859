use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::config::{ToneConfig, DEFAULT_RATE, N_CHANNELS};
use crate::error::SettingsError;

/// Left channel frequency key
pub const KEY_FREQ_LEFT: &str = "freq-0";
/// Right channel frequency key
pub const KEY_FREQ_RIGHT: &str = "freq-1";
/// Skew key, in parts per million
pub const KEY_SKEW: &str = "skew";
/// Sample rate key
pub const KEY_RATE: &str = "rate";

/// Default tone frequency for both channels
pub const DEFAULT_FREQ: i64 = 442;

fn freq_key(ch: usize) -> String {
    format!("freq-{}", ch)
}

/// Keyed settings handed over by the host.
///
/// Values live in a JSON object; lookups fall back to the registered
/// default for the key, then to zero.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    values: Map<String, Value>,
    defaults: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a JSON object.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(values) => Ok(Self {
                values,
                defaults: Map::new(),
            }),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&contents)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        self.values.get(key).or_else(|| self.defaults.get(key))
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.lookup(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn get_double(&self, key: &str) -> f64 {
        match self.lookup(key) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), Value::from(value));
    }

    /// Non-finite values cannot be represented and are stored as null.
    pub fn set_double(&mut self, key: &str, value: f64) {
        let value = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.values.insert(key.to_string(), value);
    }

    pub fn set_default_int(&mut self, key: &str, value: i64) {
        self.defaults.insert(key.to_string(), Value::from(value));
    }

    pub fn set_default_double(&mut self, key: &str, value: f64) {
        let value = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.defaults.insert(key.to_string(), value);
    }

    /// Register the source's default values.
    pub fn apply_defaults(&mut self) {
        for ch in 0..N_CHANNELS {
            self.set_default_int(&freq_key(ch), DEFAULT_FREQ);
        }
        self.set_default_double(KEY_SKEW, 0.0);
        self.set_default_int(KEY_RATE, i64::from(DEFAULT_RATE));
    }

    /// Convert into a generator configuration.
    ///
    /// Skew is entered in ppm and stored in ppb, truncated toward zero.
    pub fn to_config(&self) -> ToneConfig {
        let mut freq = [0; N_CHANNELS];
        for (ch, f) in freq.iter_mut().enumerate() {
            *f = saturate(self.get_int(&freq_key(ch)));
        }

        ToneConfig {
            freq,
            // float -> int casts saturate and map NaN to zero
            skew_ppb: (self.get_double(KEY_SKEW) * 1e3) as i32,
            rate: saturate(self.get_int(KEY_RATE)),
        }
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Label lookup for user-facing strings
pub trait Locale {
    fn text<'a>(&'a self, key: &'a str) -> &'a str;
}

/// Returns every key unchanged (the keys are English labels)
#[derive(Clone, Copy, Debug, Default)]
pub struct Untranslated;

impl Locale for Untranslated {
    fn text<'a>(&'a self, key: &'a str) -> &'a str {
        key
    }
}

/// Value range and kind of a configurable property
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PropertyKind {
    Int {
        min: i64,
        max: i64,
        step: i64,
    },
    Float {
        min: f64,
        max: f64,
        step: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        suffix: Option<String>,
    },
}

/// One configurable parameter as presented to the host
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
}

impl Property {
    fn int(name: &str, description: &str, min: i64, max: i64, step: i64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: PropertyKind::Int { min, max, step },
        }
    }
}

/// Describe the source's configurable parameters.
pub fn properties(locale: &dyn Locale) -> Vec<Property> {
    vec![
        Property::int(KEY_FREQ_LEFT, locale.text("Frequency Left"), 10, 20_000, 1),
        Property::int(KEY_FREQ_RIGHT, locale.text("Frequency Right"), 10, 20_000, 1),
        Property {
            name: KEY_SKEW.to_string(),
            description: locale.text("Skew").to_string(),
            kind: PropertyKind::Float {
                min: -5.0e4,
                max: 5.0e4,
                step: 1.0,
                suffix: Some(locale.text("ppm").to_string()),
            },
        },
        Property::int(KEY_RATE, locale.text("Sampling frequency"), 32_000, 96_000, 1000),
    ]
}
