//! Renderer contract and the built-in renderers.
//!
//! Every renderer owns its drawing surface and its animated elements. The
//! scheduler only sees the [`Visualization`] trait; optional abilities such
//! as media items or camera controls are advertised through
//! [`Capabilities`] and reached through the matching accessor.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{AnalysisFrame, AssetLoader, MediaLibrary, Options, Result, VisualizerError};

mod cosmic;
mod holiday;
mod holiday3d;
mod particles;
mod psychedelic;
mod rectangular;
mod spectrum;
pub mod surface;
mod sunburst;
mod waveform;

pub use cosmic::Cosmic;
pub use holiday::Holiday2d;
pub use holiday3d::Holiday3d;
pub use particles::Particles;
pub use psychedelic::Psychedelic;
pub use rectangular::Rectangular;
pub use spectrum::Spectrum;
pub use sunburst::Sunburst;
pub use surface::{
    CameraPose, Canvas, Color, DrawCommand, HeadlessSurfaces, SceneNode, SceneSurface,
    SurfaceProvider, SurfaceSize,
};
pub use waveform::Waveform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualizationKind {
    Spectrum,
    Waveform,
    Particles,
    Cosmic,
    Psychedelic,
    Sunburst,
    Rectangular,
    #[serde(rename = "holiday-2d")]
    Holiday2d,
    #[serde(rename = "holiday-3d")]
    Holiday3d,
}

impl VisualizationKind {
    pub const ALL: [VisualizationKind; 9] = [
        VisualizationKind::Spectrum,
        VisualizationKind::Waveform,
        VisualizationKind::Particles,
        VisualizationKind::Cosmic,
        VisualizationKind::Psychedelic,
        VisualizationKind::Sunburst,
        VisualizationKind::Rectangular,
        VisualizationKind::Holiday2d,
        VisualizationKind::Holiday3d,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Spectrum => "spectrum",
            Self::Waveform => "waveform",
            Self::Particles => "particles",
            Self::Cosmic => "cosmic",
            Self::Psychedelic => "psychedelic",
            Self::Sunburst => "sunburst",
            Self::Rectangular => "rectangular",
            Self::Holiday2d => "holiday-2d",
            Self::Holiday3d => "holiday-3d",
        }
    }

    pub fn is_3d(&self) -> bool {
        matches!(self, Self::Holiday3d)
    }
}

impl fmt::Display for VisualizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for VisualizationKind {
    type Err = VisualizerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VisualizerError::UnknownVisualization(s.to_string()))
    }
}

/// Optional abilities a renderer supports beyond the base contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub media_items: bool,
    pub camera_controls: bool,
}

/// Timing information handed to `update` alongside the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickContext {
    /// Seconds since the renderer session started.
    pub time: f64,
    /// Seconds since the previous tick.
    pub dt: f64,
    /// Smoothed dominant-source hue in degrees.
    pub hue: f32,
    /// Playback position in seconds.
    pub position: f64,
}

/// Everything a renderer factory needs besides the surface provider.
#[derive(Clone)]
pub struct BuildContext {
    pub size: SurfaceSize,
    pub seed: u64,
    pub loader: Arc<dyn AssetLoader>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("size", &self.size)
            .field("seed", &self.seed)
            .finish()
    }
}

/// The contract every renderer implements.
pub trait Visualization {
    fn kind(&self) -> VisualizationKind;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Applies an options record. Unknown keys are ignored.
    fn configure(&mut self, options: &Options);

    /// Advances animation and simulation state by one tick.
    fn update(&mut self, frame: &AnalysisFrame, ctx: &TickContext) -> Result<()>;

    /// Presents the current state. Never mutates simulation state.
    fn render(&mut self) -> Result<()>;

    /// Releases the surface and any other resources. Safe to call more than
    /// once.
    fn destroy(&mut self);

    fn media_host(&mut self) -> Option<&mut dyn MediaHost> {
        None
    }

    fn camera_controls(&mut self) -> Option<&mut dyn CameraControls> {
        None
    }
}

/// Renderers that display a rotating list of external media items.
pub trait MediaHost {
    fn set_media(&mut self, urls: &[String]);
    fn media(&self) -> &MediaLibrary;
}

/// Renderers with a user-steerable camera.
pub trait CameraControls {
    fn orbit(&mut self, yaw: f32, pitch: f32);
    fn zoom(&mut self, factor: f32);
    fn reset_camera(&mut self);
    fn pose(&self) -> CameraPose;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTheme {
    #[default]
    Rainbow,
    Warm,
    Cool,
    Mono,
}

impl ColorTheme {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rainbow" => Some(Self::Rainbow),
            "warm" => Some(Self::Warm),
            "cool" => Some(Self::Cool),
            "mono" => Some(Self::Mono),
            _ => None,
        }
    }

    /// Colour for an element at `offset` (0–1 across the element set) given
    /// the tracked hue.
    pub fn color(&self, hue: f32, offset: f32, lightness: f32) -> Color {
        match self {
            Self::Rainbow => Color::hsl(hue + offset * 360.0, 0.85, lightness),
            Self::Warm => Color::hsl(hue * 0.15 + offset * 50.0, 0.9, lightness),
            Self::Cool => Color::hsl(180.0 + hue * 0.2 + offset * 60.0, 0.8, lightness),
            Self::Mono => Color::hsl(hue, 0.0, lightness),
        }
    }
}

/// Options every renderer understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommonOptions {
    pub brightness: f32,
    pub reactivity: f32,
    pub theme: ColorTheme,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            reactivity: 1.0,
            theme: ColorTheme::Rainbow,
        }
    }
}

impl CommonOptions {
    /// Reads the shared keys, keeping current values for anything missing
    /// or malformed.
    pub fn apply(&mut self, options: &Options) {
        if let Some(brightness) = options.slider("brightness") {
            self.brightness = brightness;
        }
        if let Some(reactivity) = options.slider("reactivity") {
            self.reactivity = reactivity;
        }
        if let Some(theme) = options.text("theme").and_then(ColorTheme::parse) {
            self.theme = theme;
        }
    }
}

fn released(surface: &'static str) -> VisualizerError {
    VisualizerError::surface_unavailable(surface, "renderer has been destroyed")
}
