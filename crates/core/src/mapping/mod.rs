use serde::{Deserialize, Serialize};

/// Fraction of the remaining hue distance covered per tick at zero intensity.
pub const EASING_RATE: f32 = 0.01;

/// Fixed source label → hue table (degrees).
const LABEL_HUES: &[(&str, f32)] = &[
    ("drums", 30.0),
    ("brass", 45.0),
    ("strings", 60.0),
    ("guitar", 120.0),
    ("synth", 180.0),
    ("piano", 210.0),
    ("bass", 270.0),
    ("vocals", 330.0),
];

/// Looks up the hue associated with a source label. Unknown labels map to 0.
pub fn hue_for_label(label: &str) -> f32 {
    LABEL_HUES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
        .map(|(_, hue)| *hue)
        .unwrap_or(0.0)
}

/// Smoothed hue for one renderer session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HueState {
    /// Always within [0, 360).
    pub current_hue: f32,
    pub target_hue: f32,
}

impl HueState {
    pub fn new(hue: f32) -> Self {
        let hue = normalize(hue);
        Self {
            current_hue: hue,
            target_hue: hue,
        }
    }
}

/// Eases the displayed hue toward the hue of the dominant source. The state
/// is sticky: ticks without a label leave it untouched.
#[derive(Debug, Clone, Default)]
pub struct HueTracker {
    state: HueState,
}

impl HueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HueState {
        self.state
    }

    pub fn hue(&self) -> f32 {
        self.state.current_hue
    }

    pub fn reset(&mut self) {
        self.state = HueState::default();
    }

    /// Advances the tracked state by one tick.
    pub fn observe(&mut self, source_label: Option<&str>, intensity: f32) -> HueState {
        self.state = Self::update(self.state, source_label, intensity, 1.0);
        self.state
    }

    /// Pure hue transition. `rate_scale` multiplies the per-tick step and is
    /// 1.0 for a nominal display tick.
    ///
    /// A difference of exactly 180° is not wrapped, so the hue moves along
    /// the sign of `target - current` (210 → 30 decreases, 30 → 210
    /// increases).
    pub fn update(
        state: HueState,
        source_label: Option<&str>,
        intensity: f32,
        rate_scale: f32,
    ) -> HueState {
        let Some(label) = source_label else {
            return state;
        };

        let target = hue_for_label(label);
        let mut current = state.current_hue;
        let diff = target - current;
        if diff > 180.0 {
            current += 360.0;
        } else if diff < -180.0 {
            current -= 360.0;
        }

        let step = (EASING_RATE * (1.0 + intensity.max(0.0)) * rate_scale).clamp(0.0, 1.0);
        current += (target - current) * step;

        HueState {
            current_hue: normalize(current),
            target_hue: target,
        }
    }
}

/// Shortest signed angular distance from `from` to `to`, in (-180, 180].
pub fn angular_distance(from: f32, to: f32) -> f32 {
    let d = (to - from).rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

fn normalize(hue: f32) -> f32 {
    let wrapped = hue.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
