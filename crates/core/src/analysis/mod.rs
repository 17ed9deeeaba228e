use serde::{Deserialize, Serialize};

use crate::{Result, VisualizerError};

pub mod classifier;

pub use classifier::{BandHeuristicClassifier, SourceClassifier, SourceEstimate};

/// Magnitude a bin must exceed to count as a beat onset.
pub const ONSET_THRESHOLD: u8 = 200;
/// Fraction of the spectrum treated as the bass region.
const BASS_FRACTION: f32 = 0.1;
/// Weight falloff across the bass region (first bin 1.0, last bin ~0.3).
const BASS_WEIGHT_FALLOFF: f32 = 0.7;
const BASS_EXPONENT: f32 = 1.5;

/// One tick's worth of derived audio features. Built once by
/// [`FeatureExtractor`] and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub frequency_magnitudes: Vec<u8>,
    pub time_domain_samples: Vec<u8>,
    /// Mean magnitude normalised to [0, 1].
    pub average_intensity: f32,
    /// Low-band weighted loudness in [0, 1].
    pub bass_energy: f32,
    /// Ascending bin indices flagged as spectral peaks above
    /// [`ONSET_THRESHOLD`].
    pub beat_onsets: Vec<usize>,
    pub source_label: Option<String>,
    #[serde(default)]
    pub source_confidence: f32,
}

impl AnalysisFrame {
    pub fn bin_count(&self) -> usize {
        self.frequency_magnitudes.len()
    }

    pub fn has_onset(&self) -> bool {
        !self.beat_onsets.is_empty()
    }

    /// Returns true when the frame's source label equals `label`.
    pub fn source_is(&self, label: &str) -> bool {
        self.source_label.as_deref() == Some(label)
    }

    /// Mean magnitude over the inclusive bin range, normalised to [0, 1].
    pub fn band_mean(&self, band: (usize, usize)) -> Result<f32> {
        let (min, max) = band;
        if min > max || max >= self.frequency_magnitudes.len() {
            return Err(VisualizerError::invalid(format!(
                "band {min}..={max} outside of {} bins",
                self.frequency_magnitudes.len()
            )));
        }

        let slice = &self.frequency_magnitudes[min..=max];
        let sum: u32 = slice.iter().map(|&m| m as u32).sum();
        Ok(sum as f32 / (slice.len() as f32 * 255.0))
    }
}

/// Turns the raw byte arrays captured by the analysis tap into an
/// [`AnalysisFrame`]. The extractor keeps no history between calls; any
/// smoothing happens upstream in the tap or downstream in consumers.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Builds a frame without a source estimate.
    pub fn extract(&self, raw_frequency: &[u8], raw_time_domain: &[u8]) -> Result<AnalysisFrame> {
        self.extract_with_source(raw_frequency, raw_time_domain, None)
    }

    pub fn extract_with_source(
        &self,
        raw_frequency: &[u8],
        raw_time_domain: &[u8],
        source: Option<SourceEstimate>,
    ) -> Result<AnalysisFrame> {
        if raw_frequency.is_empty() {
            return Err(VisualizerError::invalid(
                "feature extraction requires at least one frequency bin",
            ));
        }

        if raw_frequency.len() != raw_time_domain.len() {
            return Err(VisualizerError::invalid(format!(
                "frequency ({}) and time-domain ({}) lengths differ",
                raw_frequency.len(),
                raw_time_domain.len()
            )));
        }

        let (source_label, source_confidence) = match source {
            Some(estimate) => (Some(estimate.label), estimate.confidence.clamp(0.0, 1.0)),
            None => (None, 0.0),
        };

        Ok(AnalysisFrame {
            frequency_magnitudes: raw_frequency.to_vec(),
            time_domain_samples: raw_time_domain.to_vec(),
            average_intensity: average_intensity(raw_frequency),
            bass_energy: bass_energy(raw_frequency),
            beat_onsets: beat_onsets(raw_frequency),
            source_label,
            source_confidence,
        })
    }
}

fn average_intensity(magnitudes: &[u8]) -> f32 {
    let sum: u64 = magnitudes.iter().map(|&m| m as u64).sum();
    sum as f32 / (magnitudes.len() as f32 * 255.0)
}

fn bass_energy(magnitudes: &[u8]) -> f32 {
    let bass_bins = (magnitudes.len() as f32 * BASS_FRACTION).floor() as usize;

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (i, &magnitude) in magnitudes.iter().take(bass_bins).enumerate() {
        let weight = 1.0 - (i as f32 / bass_bins as f32) * BASS_WEIGHT_FALLOFF;
        weighted_sum += (magnitude as f32 / 255.0) * weight;
        weight_sum += weight;
    }

    if weight_sum <= 0.0 {
        return 0.0;
    }

    (weighted_sum / weight_sum).powf(BASS_EXPONENT).clamp(0.0, 1.0)
}

fn beat_onsets(magnitudes: &[u8]) -> Vec<usize> {
    if magnitudes.len() < 3 {
        return Vec::new();
    }

    magnitudes
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2] && w[1] > ONSET_THRESHOLD)
        .map(|(i, _)| i + 1)
        .collect()
}
