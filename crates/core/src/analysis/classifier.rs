use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Opaque classifier output naming the most prominent source in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEstimate {
    pub label: String,
    pub confidence: f32,
}

impl SourceEstimate {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Anything that can name a dominant source from a frequency snapshot.
pub trait SourceClassifier {
    fn classify(&mut self, frequency: &[u8]) -> Option<SourceEstimate>;
}

const RECOMPUTE_INTERVAL: u32 = 30;
const SILENCE_LEVEL: f32 = 0.02;

/// Coarse placeholder heuristic: compares a handful of band energies and
/// picks a label, re-evaluating only every [`RECOMPUTE_INTERVAL`] ticks. A
/// random jitter is mixed into the scores, so the label can drift without a
/// real musical change.
#[derive(Debug)]
pub struct BandHeuristicClassifier {
    rng: StdRng,
    ticks: u32,
    current: Option<SourceEstimate>,
}

impl BandHeuristicClassifier {
    pub fn new(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            ticks: 0,
            current: None,
        }
    }

    fn evaluate(&mut self, frequency: &[u8]) -> Option<SourceEstimate> {
        let n = frequency.len();
        if n < 8 {
            return None;
        }

        let band = |from: f32, to: f32| {
            let start = (n as f32 * from) as usize;
            let end = ((n as f32 * to) as usize).max(start + 1).min(n);
            let sum: u32 = frequency[start..end].iter().map(|&m| m as u32).sum();
            sum as f32 / ((end - start) as f32 * 255.0)
        };

        let sub = band(0.0, 0.02);
        let low = band(0.02, 0.08);
        let low_mid = band(0.08, 0.2);
        let mid = band(0.2, 0.4);
        let high = band(0.4, 1.0);

        let total = sub + low + low_mid + mid + high;
        if total / 5.0 < SILENCE_LEVEL {
            return None;
        }

        let candidates = [
            ("bass", sub * 1.2),
            ("drums", low + high * 0.5),
            ("piano", low_mid),
            ("guitar", (low_mid + mid) * 0.5),
            ("vocals", mid),
            ("synth", high * 1.1),
        ];

        let mut best: Option<(&str, f32)> = None;
        for (label, score) in candidates {
            let jittered = score * (0.8 + self.rng.random::<f32>() * 0.4);
            if best.map(|(_, s)| jittered > s).unwrap_or(true) {
                best = Some((label, jittered));
            }
        }

        // Confidence is how far the winner stands above the average band.
        let average = total / 5.0;
        best.map(|(label, score)| {
            SourceEstimate::new(label, (score / (average * 2.0)).clamp(0.0, 1.0))
        })
    }
}

impl SourceClassifier for BandHeuristicClassifier {
    fn classify(&mut self, frequency: &[u8]) -> Option<SourceEstimate> {
        if self.ticks % RECOMPUTE_INTERVAL == 0 {
            self.current = self.evaluate(frequency);
            if let Some(estimate) = &self.current {
                tracing::debug!(label = %estimate.label, confidence = estimate.confidence, "source estimate updated");
            }
        }
        self.ticks = self.ticks.wrapping_add(1);
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_no_label() {
        let mut classifier = BandHeuristicClassifier::new(7);
        assert!(classifier.classify(&[0; 1024]).is_none());
    }

    #[test]
    fn holds_label_between_recomputes() {
        let mut classifier = BandHeuristicClassifier::new(7);
        let loud = vec![180u8; 1024];
        let first = classifier.classify(&loud).expect("loud spectrum is labelled");

        for _ in 1..RECOMPUTE_INTERVAL {
            let held = classifier.classify(&[0; 1024]);
            assert_eq!(held.as_ref(), Some(&first));
        }

        assert!(classifier.classify(&[0; 1024]).is_none());
    }

    #[test]
    fn confidence_is_normalised() {
        let mut classifier = BandHeuristicClassifier::new(3);
        let mut spectrum = vec![5u8; 512];
        for bin in spectrum.iter_mut().take(10) {
            *bin = 250;
        }
        let estimate = classifier.classify(&spectrum).unwrap();
        assert!((0.0..=1.0).contains(&estimate.confidence));
    }
}
