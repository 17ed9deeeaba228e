use serde::{Deserialize, Serialize};

pub mod animator;
pub mod figures;

pub use animator::PatternAnimator;
pub use figures::InstrumentFigures;

/// Animation personality of a decorative element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    Static,
    Blink,
    Chase,
    Wave,
    Twinkle,
    Strobe,
    Fade,
    Alternate,
}

impl Pattern {
    pub const ALL: [Pattern; 8] = [
        Pattern::Static,
        Pattern::Blink,
        Pattern::Chase,
        Pattern::Wave,
        Pattern::Twinkle,
        Pattern::Strobe,
        Pattern::Fade,
        Pattern::Alternate,
    ];
}

/// Pattern-local state. Each pattern only touches the fields it owns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    pub position: f32,
    pub fade_level: f32,
    pub strobe_phase: f32,
    pub color_index: usize,
    pub wave_position: f32,
    /// Tick-clock time at which a beat boost expires.
    pub boost_until: Option<f64>,
    pub scale: f32,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            position: 0.0,
            fade_level: 0.0,
            strobe_phase: 0.0,
            color_index: 0,
            wave_position: 0.0,
            boost_until: None,
            scale: 1.0,
        }
    }
}

/// Renderer-owned decorative unit listening to a slice of the spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatedElement {
    pub pattern: Pattern,
    /// Inclusive `(min_bin, max_bin)`.
    pub reactive_band: (usize, usize),
    pub source_affinity: Option<String>,
    pub brightness: f32,
    pub active: bool,
    pub opacity: f32,
    pub palette_len: usize,
    pub state: ElementState,
}

impl AnimatedElement {
    pub fn new(pattern: Pattern, reactive_band: (usize, usize)) -> Self {
        Self {
            pattern,
            reactive_band,
            source_affinity: None,
            brightness: 0.0,
            active: false,
            opacity: 1.0,
            palette_len: 1,
            state: ElementState::default(),
        }
    }

    pub fn with_affinity(mut self, label: impl Into<String>) -> Self {
        self.source_affinity = Some(label.into());
        self
    }

    pub fn with_palette(mut self, palette_len: usize) -> Self {
        self.palette_len = palette_len.max(1);
        self
    }

    /// Starts the element's travelling position at `phase`, wrapped to [0, 1).
    pub fn with_phase(mut self, phase: f32) -> Self {
        self.state.position = phase.rem_euclid(1.0);
        self
    }

    /// Whether the frame's source label matches this element's affinity.
    pub fn matches_source(&self, label: Option<&str>) -> bool {
        match (&self.source_affinity, label) {
            (Some(affinity), Some(label)) => affinity == label,
            _ => false,
        }
    }

    /// Brightness used at draw time; inactive elements glow faintly.
    pub fn display_level(&self) -> f32 {
        let base = if self.active {
            self.brightness.max(0.35)
        } else {
            self.brightness * 0.2
        };
        (base * self.opacity).clamp(0.0, 1.0)
    }
}

/// Spreads `count` equally sized bands over the lower `coverage` fraction of
/// `bins`.
pub fn split_bands(bins: usize, count: usize, coverage: f32) -> Vec<(usize, usize)> {
    if bins == 0 || count == 0 {
        return Vec::new();
    }

    let span = ((bins as f32 * coverage.clamp(0.0, 1.0)) as usize).max(count).min(bins);
    let width = (span / count).max(1);
    (0..count)
        .map(|i| {
            let start = (i * width).min(bins - 1);
            let end = (start + width - 1).min(bins - 1);
            (start, end)
        })
        .collect()
}
