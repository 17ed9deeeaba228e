use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AudioConfig, Result};

use super::{AnalysisTap, DecodedAudio, RawSamples};

/// Samples decoded audio around the playback position and produces the byte
/// spectra a browser-style analyser node would: Blackman window, magnitude
/// scaled by the window length, exponential smoothing across captures, and a
/// decibel range mapped onto 0..=255.
pub struct SignalTap {
    audio: Arc<DecodedAudio>,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    smoothed: Vec<f32>,
}

impl SignalTap {
    pub fn new(audio: Arc<DecodedAudio>, config: &AudioConfig) -> Result<Self> {
        config.validate()?;
        let fft_size = config.fft_size;

        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Ok(Self {
            audio,
            fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            plan,
            window: blackman_window(fft_size),
            input,
            spectrum,
            scratch,
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Copies the `fft_size` samples ending at `position` into `input`,
    /// zero-padding anything before the start of the media.
    fn load_window(&mut self, position: f64) {
        let samples = &self.audio.samples;
        let end = ((position.max(0.0) * self.audio.sample_rate as f64) as usize).min(samples.len());
        let start = end.saturating_sub(self.fft_size);
        let padding = self.fft_size - (end - start);

        self.input[..padding].iter_mut().for_each(|v| *v = 0.0);
        self.input[padding..].copy_from_slice(&samples[start..end]);
    }
}

impl AnalysisTap for SignalTap {
    fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn capture(&mut self, position: f64) -> Result<RawSamples> {
        self.load_window(position);
        let bins = self.bin_count();

        let time_domain = self.input[self.fft_size - bins..]
            .iter()
            .map(|&s| (128.0 + s * 128.0).clamp(0.0, 255.0) as u8)
            .collect();

        for (sample, weight) in self.input.iter_mut().zip(&self.window) {
            *sample *= weight;
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let scale = 1.0 / self.fft_size as f32;
        let range = self.max_decibels - self.min_decibels;
        let mut frequency = Vec::with_capacity(bins);
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = bin.norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;

            let byte = if *smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                (255.0 * (db - self.min_decibels) / range).clamp(0.0, 255.0) as u8
            } else {
                0
            };
            frequency.push(byte);
        }

        Ok(RawSamples {
            frequency,
            time_domain,
        })
    }
}

impl fmt::Debug for SignalTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalTap")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("sample_rate", &self.audio.sample_rate)
            .finish()
    }
}

fn blackman_window(len: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    (0..len)
        .map(|i| {
            let x = i as f32 / len as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, seconds: f32, sample_rate: u32) -> Arc<DecodedAudio> {
        let len = (seconds * sample_rate as f32) as usize;
        let samples = (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.8)
            .collect();
        DecodedAudio::from_samples(samples, sample_rate).into_shared()
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let audio = DecodedAudio::from_samples(vec![0.0; 8192], 44_100).into_shared();
        let mut tap = SignalTap::new(audio, &AudioConfig::default()).unwrap();
        let raw = tap.capture(0.1).unwrap();

        assert_eq!(raw.frequency.len(), 1024);
        assert_eq!(raw.time_domain.len(), 1024);
        assert!(raw.frequency.iter().all(|&b| b == 0));
        assert!(raw.time_domain.iter().all(|&b| b == 128));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let sample_rate = 44_100;
        let audio = tone(1_000.0, 1.0, sample_rate);
        let config = AudioConfig {
            smoothing: 0.0,
            min_decibels: -160.0,
            max_decibels: 0.0,
            ..AudioConfig::default()
        };
        let mut tap = SignalTap::new(audio, &config).unwrap();
        let raw = tap.capture(0.5).unwrap();

        let peak = raw
            .frequency
            .iter()
            .enumerate()
            .max_by_key(|(_, &b)| b)
            .map(|(i, _)| i)
            .unwrap();
        let expected = (1_000.0 * 2048.0 / sample_rate as f32).round() as usize;
        assert!(peak.abs_diff(expected) <= 1, "peak {peak} expected {expected}");
    }

    #[test]
    fn smoothing_lags_behind_onsets() {
        let sample_rate = 44_100;
        let mut samples = vec![0.0; sample_rate as usize];
        samples.extend(tone(500.0, 1.0, sample_rate).samples.iter());
        let audio = DecodedAudio::from_samples(samples, sample_rate).into_shared();

        let mut smooth = SignalTap::new(audio.clone(), &AudioConfig::default()).unwrap();
        let mut instant = SignalTap::new(
            audio,
            &AudioConfig {
                smoothing: 0.0,
                ..AudioConfig::default()
            },
        )
        .unwrap();

        smooth.capture(0.9).unwrap();
        instant.capture(0.9).unwrap();
        let a: u32 = smooth.capture(1.5).unwrap().frequency.iter().map(|&b| b as u32).sum();
        let b: u32 = instant.capture(1.5).unwrap().frequency.iter().map(|&b| b as u32).sum();
        assert!(a < b);
    }

    #[test]
    fn reset_forgets_smoothing_history() {
        let audio = tone(440.0, 2.0, 44_100);
        let mut fresh = SignalTap::new(audio.clone(), &AudioConfig::default()).unwrap();
        let mut used = SignalTap::new(audio, &AudioConfig::default()).unwrap();

        for i in 0..5 {
            used.capture(0.2 + i as f64 * 0.1).unwrap();
        }
        let warm = used.capture(1.5).unwrap();
        let cold = fresh.capture(1.5).unwrap();
        assert_ne!(warm.frequency, cold.frequency);

        used.reset();
        assert_eq!(used.capture(1.5).unwrap(), cold);
    }

    #[test]
    fn rejects_invalid_fft_size() {
        let audio = DecodedAudio::default().into_shared();
        let config = AudioConfig {
            fft_size: 1000,
            ..AudioConfig::default()
        };
        let err = SignalTap::new(audio, &config).unwrap_err();
        assert!(matches!(err, crate::VisualizerError::Message(_)));
    }
}
