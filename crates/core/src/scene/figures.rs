use rand::Rng;

use crate::{AnalysisFrame, Result};

use super::{AnimatedElement, Pattern, PatternAnimator};

/// Confidence a source estimate needs before a figure is spawned for it.
pub const SPAWN_CONFIDENCE: f32 = 0.5;
/// Seconds a figure survives without its source being heard.
const GRACE_SECONDS: f64 = 2.0;
/// Opacity lost per tick while retiring.
const FADE_STEP: f32 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub label: String,
    pub element: AnimatedElement,
    pub last_heard: f64,
    pub retiring: bool,
    /// Horizontal slot in [0, 1) assigned at spawn.
    pub slot: f32,
}

/// Instrument figures that come and go with the classifier output. New
/// figures appear when a label crosses [`SPAWN_CONFIDENCE`]; figures whose
/// label goes quiet fade out and are dropped once fully transparent.
#[derive(Debug, Clone, Default)]
pub struct InstrumentFigures {
    figures: Vec<Figure>,
    spawned: usize,
}

impl InstrumentFigures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn figures(&self) -> &[Figure] {
        &self.figures
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    pub fn clear(&mut self) {
        self.figures.clear();
    }

    pub fn update<R: Rng>(&mut self, frame: &AnalysisFrame, time: f64, rng: &mut R) -> Result<()> {
        if let Some(label) = frame.source_label.as_deref() {
            if frame.source_confidence >= SPAWN_CONFIDENCE {
                self.observe(label, frame.bin_count(), time);
            }
        }

        for figure in &mut self.figures {
            if !figure.retiring && time - figure.last_heard > GRACE_SECONDS {
                tracing::debug!(label = %figure.label, "retiring instrument figure");
                figure.retiring = true;
            }

            if figure.retiring {
                figure.element.opacity = (figure.element.opacity - FADE_STEP).max(0.0);
            }

            PatternAnimator::step(&mut figure.element, frame, time, rng)?;
        }

        self.figures
            .retain(|figure| !(figure.retiring && figure.element.opacity <= 0.0));
        Ok(())
    }

    fn observe(&mut self, label: &str, bins: usize, time: f64) {
        if let Some(figure) = self
            .figures
            .iter_mut()
            .find(|figure| figure.label == label && !figure.retiring)
        {
            figure.last_heard = time;
            return;
        }

        if bins == 0 {
            return;
        }

        let band = (0, (bins / 4).max(1).min(bins - 1));
        let element = AnimatedElement::new(Pattern::Fade, band).with_affinity(label);
        // Golden-ratio spacing keeps successive figures apart.
        let slot = (self.spawned as f32 * 0.618_034).fract();
        self.spawned += 1;

        tracing::debug!(label, slot, "spawning instrument figure");
        self.figures.push(Figure {
            label: label.to_string(),
            element,
            last_heard: time,
            retiring: false,
            slot,
        });
    }
}
