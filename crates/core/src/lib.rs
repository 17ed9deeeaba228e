//! Core library for the Pulse Visualiser application.
//!
//! Audio is decoded and played through a [`Transport`], sampled every display
//! tick by an [`AnalysisTap`], reduced to an [`AnalysisFrame`] and handed by
//! the [`RenderScheduler`] to whichever [`Visualization`] is live. Renderers
//! animate their decorative elements with the [`PatternAnimator`] and tint
//! them with the hue tracked from the dominant sound source.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod mapping;
pub mod render;
pub mod scene;
pub mod timeline;
pub mod visual;

pub use analysis::{
    AnalysisFrame, BandHeuristicClassifier, FeatureExtractor, SourceClassifier, SourceEstimate,
};
pub use assets::{AssetLoader, FileAssetLoader, LoadState, MediaItem, MediaKind, MediaLibrary};
pub use audio::{decode_file, AnalysisTap, DecodedAudio, RawSamples, SignalTap};
pub use config::{AppConfig, AudioConfig, DisplayConfig, OptionValue, Options};
pub use error::{Result, VisualizerError};
pub use mapping::{HueState, HueTracker};
pub use render::{RenderScheduler, TickOutcome, VisualizationRegistry};
pub use scene::{AnimatedElement, ElementState, InstrumentFigures, Pattern, PatternAnimator};
pub use timeline::{
    EngineClock, ManualClock, PlaybackBackend, PlaybackState, SilentBackend, SourceId,
    SystemClock, Transport, TransportState,
};
pub use visual::{
    BuildContext, CameraControls, Capabilities, HeadlessSurfaces, MediaHost, SurfaceProvider,
    SurfaceSize, TickContext, Visualization, VisualizationKind,
};
