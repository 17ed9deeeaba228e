use rand::Rng;

use crate::{AnalysisFrame, Result};

use super::{AnimatedElement, Pattern};

/// Energy above which an element is switched on regardless of pattern.
pub const ACTIVATION_FLOOR: f32 = 0.3;
/// Energy multiplier applied when the element's source affinity matches.
pub const AFFINITY_BOOST: f32 = 1.5;

/// Evaluates per-element animation patterns. Every call is a pure function of
/// `(element, band_energy, source_matches, time, rng)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternAnimator;

impl PatternAnimator {
    /// Mean normalised magnitude over the element's reactive band.
    pub fn band_energy(frame: &AnalysisFrame, element: &AnimatedElement) -> Result<f32> {
        frame.band_mean(element.reactive_band)
    }

    /// Convenience wrapper that reads the band energy and affinity from the
    /// frame and advances the element in place.
    pub fn step<R: Rng>(
        element: &mut AnimatedElement,
        frame: &AnalysisFrame,
        time: f64,
        rng: &mut R,
    ) -> Result<()> {
        let energy = Self::band_energy(frame, element)?;
        let matches = element.matches_source(frame.source_label.as_deref());
        *element = Self::advance(element, energy, matches, time, rng);
        Ok(())
    }

    pub fn advance<R: Rng>(
        element: &AnimatedElement,
        band_energy: f32,
        source_matches: bool,
        time: f64,
        rng: &mut R,
    ) -> AnimatedElement {
        let mut next = element.clone();
        let energy = if source_matches {
            band_energy * AFFINITY_BOOST
        } else {
            band_energy
        };
        let t = time as f32;
        let state = &mut next.state;

        // Loud passages are never skipped. Patterns below may still switch
        // the element off again within the same tick.
        if energy > ACTIVATION_FLOOR {
            next.active = true;
        }

        match next.pattern {
            Pattern::Static => {
                next.brightness = (energy * 1.5).min(1.0);
            }
            Pattern::Blink => {
                next.active = (t * 5.0 * energy).sin() > 0.0;
            }
            Pattern::Chase => {
                state.position = (state.position + energy * 0.1).rem_euclid(1.0);
            }
            Pattern::Twinkle => {
                if rng.random::<f32>() < energy * 0.2 {
                    next.active = !next.active;
                }
            }
            Pattern::Strobe => {
                state.strobe_phase = (state.strobe_phase + energy * 0.5).rem_euclid(1.0);
                next.active = state.strobe_phase < 0.5;
            }
            Pattern::Fade => {
                state.fade_level = (t * 2.0 * energy).sin() * 0.5 + 0.5;
                next.brightness = state.fade_level * energy;
            }
            Pattern::Alternate => {
                if rng.random::<f32>() < energy * 0.1 {
                    state.color_index = (state.color_index + 1) % next.palette_len.max(1);
                }
            }
            Pattern::Wave => {
                state.wave_position = (t * energy).rem_euclid(1.0);
            }
        }

        if let Some(until) = state.boost_until {
            if time >= until {
                state.boost_until = None;
                state.scale = 1.0;
            }
        }

        next
    }

    /// Enlarges the element until `time + duration`. The next `advance` past
    /// that point restores the normal scale.
    pub fn trigger_boost(element: &mut AnimatedElement, time: f64, duration: f64, scale: f32) {
        element.state.scale = scale;
        element.state.boost_until = Some(time + duration);
    }
}
