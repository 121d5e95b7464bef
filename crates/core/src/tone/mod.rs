use std::f64::consts::TAU;

use crate::{Result, ToneConfig, WaveGridError};

const CARRIER_GAIN: f64 = 0.5;
const ATTACK_SECONDS: f64 = 0.02;
const DECAY_SECONDS: f64 = 0.05;
const RELEASE_SECONDS: f64 = 0.02;
const SUSTAIN_LEVEL: f64 = 0.8;

/// A synthesized, enveloped tone ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Tone {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub pitch: f64,
}

impl Tone {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Attack, decay, sustain, release amplitude curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    values: Vec<f64>,
}

impl Envelope {
    /// Lays out the four segments back to back for a tone of `duration`
    /// seconds. Each segment holds `floor(sample_rate * seconds)` samples.
    pub fn adsr(sample_rate: u32, duration: f64) -> Self {
        let rate = f64::from(sample_rate);
        let count = |seconds: f64| (rate * seconds).max(0.0) as usize;

        let mut values = Vec::new();
        values.extend(ramp(0.0, 1.0, count(ATTACK_SECONDS)));
        values.extend(ramp(1.0, SUSTAIN_LEVEL, count(DECAY_SECONDS)));
        values.extend(std::iter::repeat(SUSTAIN_LEVEL).take(count(
            duration - ATTACK_SECONDS - DECAY_SECONDS,
        )));
        values.extend(ramp(SUSTAIN_LEVEL, 0.0, count(RELEASE_SECONDS)));

        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Drops everything past `len` samples.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }
}

/// Inclusive linear ramp over `count` samples.
fn ramp(from: f64, to: f64, count: usize) -> impl Iterator<Item = f64> {
    let step = if count > 1 {
        (to - from) / (count - 1) as f64
    } else {
        0.0
    };
    (0..count).map(move |i| {
        if count > 1 && i == count - 1 {
            to
        } else {
            from + step * i as f64
        }
    })
}

/// Derives a short enveloped sine tone from a brightness value.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    base_frequency: f64,
    pitch_variation: f64,
    sample_rate: u32,
    duration: f64,
}

impl ToneSynthesizer {
    pub fn new(config: &ToneConfig) -> Self {
        Self {
            base_frequency: config.base_frequency,
            pitch_variation: config.pitch_variation,
            sample_rate: config.sample_rate,
            duration: config.duration_seconds,
        }
    }

    pub fn pitch(&self, brightness: f64) -> f64 {
        self.base_frequency + brightness * self.pitch_variation
    }

    /// Number of carrier samples per tone.
    pub fn sample_count(&self) -> usize {
        (f64::from(self.sample_rate) * self.duration) as usize
    }

    pub fn synthesize(&self, brightness: f64) -> Result<Tone> {
        let pitch = self.pitch(brightness);
        let rate = f64::from(self.sample_rate);
        let len = self.sample_count();

        let mut envelope = Envelope::adsr(self.sample_rate, self.duration);
        if envelope.len() < len {
            return Err(WaveGridError::audio(format!(
                "envelope covers {} samples but the carrier needs {len}",
                envelope.len()
            )));
        }
        envelope.truncate(len);

        let samples = envelope
            .values()
            .iter()
            .enumerate()
            .map(|(i, gain)| {
                let t = i as f64 / rate;
                (CARRIER_GAIN * (TAU * pitch * t).sin() * gain) as f32
            })
            .collect();

        tracing::trace!(brightness, pitch, samples = len, "synthesized tone");

        Ok(Tone {
            samples,
            sample_rate: self.sample_rate,
            pitch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth() -> ToneSynthesizer {
        ToneSynthesizer::new(&ToneConfig::default())
    }

    #[test]
    fn pitch_follows_brightness() {
        let synth = synth();
        assert_eq!(synth.pitch(0.0), 440.0);
        assert!((synth.pitch(15.0) - 440.3).abs() < 1e-9);
    }

    #[test]
    fn envelope_segments_have_expected_lengths() {
        let envelope = Envelope::adsr(44_100, 0.1);
        // 882 attack + 2205 decay + 1323 sustain + 882 release
        assert_eq!(envelope.len(), 5292);
        assert_eq!(envelope.values()[0], 0.0);
        assert_eq!(envelope.values()[881], 1.0);
        assert_eq!(envelope.values()[882], 1.0);
        assert_eq!(envelope.values()[882 + 2204], SUSTAIN_LEVEL);
        assert_eq!(*envelope.values().last().unwrap(), 0.0);
        assert!(envelope.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn tone_matches_carrier_length() {
        let synth = synth();
        let tone = synth.synthesize(7.0).unwrap();
        assert_eq!(synth.sample_count(), 4410);
        assert_eq!(tone.samples.len(), 4410);
        assert_eq!(tone.sample_rate, 44_100);
        assert!((tone.duration_seconds() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn tone_is_shaped_by_envelope() {
        let tone = synth().synthesize(1.0).unwrap();
        assert_eq!(tone.samples[0], 0.0);
        assert!(tone
            .samples
            .iter()
            .all(|s| s.abs() <= CARRIER_GAIN as f32 + f32::EPSILON));
        let peak = tone.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.35);
    }

    #[test]
    fn envelope_is_truncated_to_the_carrier() {
        for duration in [0.07, 0.1, 0.25, 0.5] {
            let config = ToneConfig {
                duration_seconds: duration,
                ..ToneConfig::default()
            };
            let synth = ToneSynthesizer::new(&config);
            let tone = synth.synthesize(3.0).unwrap();
            assert_eq!(tone.samples.len(), synth.sample_count(), "{duration}");
        }
    }

    #[test]
    fn short_envelope_is_an_audio_error() {
        // At 10 Hz every segment rounds down to zero samples.
        let config = ToneConfig {
            sample_rate: 10,
            ..ToneConfig::default()
        };
        let err = ToneSynthesizer::new(&config).synthesize(1.0).unwrap_err();
        assert!(matches!(err, WaveGridError::Audio(_)));
    }

    #[test]
    fn ramp_is_inclusive() {
        let values: Vec<f64> = ramp(0.0, 1.0, 5).collect();
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(ramp(1.0, 0.0, 1).collect::<Vec<_>>(), vec![1.0]);
        assert_eq!(ramp(1.0, 0.0, 0).count(), 0);
    }
}
