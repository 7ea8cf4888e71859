//! Playback engine - feeds generated frames to the default output device
//!
//! The generator thread pushes interleaved stereo samples into a lock-free
//! ring buffer through a [`RingSink`]; the cpal callback drains it. When the
//! ring is full the newest samples are dropped, and when it runs dry the
//! device plays silence. No resampling happens here.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::frame::{AudioFormat, AudioSink, SourceAudio};
use crate::config::N_CHANNELS;
use crate::error::Error;

/// Sink that interleaves planar frames into a ring buffer
pub struct RingSink {
    producer: HeapProd<f32>,
    /// Interleave scratch space, grown on demand
    scratch: Vec<f32>,
    dropped: u64,
}

impl RingSink {
    pub fn new(producer: HeapProd<f32>) -> Self {
        Self {
            producer,
            scratch: Vec::with_capacity(4096),
            dropped: 0,
        }
    }

    /// Create a ring of `capacity` samples and return both ends
    pub fn with_capacity(capacity: usize) -> (Self, HeapCons<f32>) {
        let (producer, consumer) = HeapRb::<f32>::new(capacity.max(N_CHANNELS)).split();
        (Self::new(producer), consumer)
    }

    /// Interleaved samples that did not fit in the ring
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl AudioSink for RingSink {
    fn output_audio(&mut self, audio: &SourceAudio<'_>) {
        self.scratch.clear();
        match audio.format {
            AudioFormat::FloatPlanar => {
                for i in 0..audio.frames {
                    for ch in 0..N_CHANNELS {
                        self.scratch.push(audio.data[ch][i]);
                    }
                }
            }
        }

        // Only push whole sample pairs so the channels stay aligned
        let room = self.producer.vacant_len() / N_CHANNELS * N_CHANNELS;
        let n = room.min(self.scratch.len());
        let pushed = self.producer.push_slice(&self.scratch[..n]);

        let lost = (self.scratch.len() - pushed) as u64;
        if lost > 0 {
            if self.dropped == 0 {
                log::warn!("Playback ring full, dropping samples");
            }
            self.dropped += lost;
        }
    }
}

/// Copy stereo samples from the ring into a device buffer of any format
///
/// Extra device channels get silence; a mono device gets the L/R average.
fn write_device_samples<T: Sample + FromSample<f32>>(
    data: &mut [T],
    channels: usize,
    consumer: &mut HeapCons<f32>,
    scratch: &mut Vec<f32>,
) {
    let channels = channels.max(1);
    let frames = data.len() / channels;
    let wanted = frames * N_CHANNELS;
    if scratch.len() < wanted {
        scratch.resize(wanted, 0.0);
    }
    let pairs = consumer.pop_slice(&mut scratch[..wanted]) / N_CHANNELS;

    for (f, frame) in data.chunks_mut(channels).enumerate() {
        if f >= pairs {
            frame.fill(T::EQUILIBRIUM);
            continue;
        }

        let left = scratch[f * N_CHANNELS];
        let right = scratch[f * N_CHANNELS + 1];
        if channels >= 2 {
            frame[0] = T::from_sample(left);
            frame[1] = T::from_sample(right);
            for ch in frame.iter_mut().skip(2) {
                *ch = T::EQUILIBRIUM;
            }
        } else {
            frame[0] = T::from_sample((left + right) / 2.0);
        }
    }
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: HeapCons<f32>,
) -> Result<cpal::Stream, Error> {
    let channels = usize::from(config.channels);
    let mut scratch = vec![0.0f32; 4096];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            write_device_samples(data, channels, &mut consumer, &mut scratch);
        },
        |err| log::error!("Audio stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Output stream on the default device
///
/// Keep the engine alive for as long as audio should play.
pub struct PlaybackEngine {
    _stream: cpal::Stream,
    sample_rate: u32,
    device_name: String,
}

impl PlaybackEngine {
    /// Open the default output device and start playing.
    ///
    /// `source_rate` is the rate the generator will produce; the ring holds
    /// `buffer_ms` of stereo audio at that rate.
    pub fn open(source_rate: u32, buffer_ms: u32) -> Result<(Self, RingSink), Error> {
        log::info!("Starting playback engine...");

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            log::error!("No output device found");
            Error::NoOutputDevice
        })?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using output device: {}", device_name);

        let supported = device.default_output_config()?;
        log::info!("Audio config: {:?}", supported);

        let sample_rate = supported.sample_rate().0;
        if sample_rate != source_rate {
            log::warn!(
                "Device runs at {} Hz but the tone is generated at {} Hz; pitch will be off",
                sample_rate,
                source_rate
            );
        }

        let capacity = (u64::from(source_rate) * u64::from(buffer_ms) / 1000) as usize * N_CHANNELS;
        let (sink, consumer) = RingSink::with_capacity(capacity);

        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer)?,
            format => {
                log::error!("Unsupported sample format: {:?}", format);
                return Err(Error::UnsupportedFormat(format));
            }
        };

        stream.play()?;
        log::info!("Playback started");

        Ok((
            Self {
                _stream: stream,
                sample_rate,
                device_name,
            },
            sink,
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}
