use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;

mod decode;
mod tap;

pub use decode::decode_file;
pub use tap::SignalTap;

/// Mono PCM held in memory after decoding.
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length of the media in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Byte arrays captured from the analysis tap for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSamples {
    pub frequency: Vec<u8>,
    pub time_domain: Vec<u8>,
}

/// Source of per-tick spectral and waveform snapshots.
pub trait AnalysisTap {
    /// Number of frequency bins (and time-domain samples) per capture.
    fn bin_count(&self) -> usize;

    /// Captures whatever is current at `position` seconds into the media.
    fn capture(&mut self, position: f64) -> Result<RawSamples>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_sample_rate() {
        let audio = DecodedAudio::from_samples(vec![0.0; 48_000], 24_000);
        assert!((audio.duration() - 2.0).abs() < f64::EPSILON);
        assert_eq!(DecodedAudio::default().duration(), 0.0);
    }
}
