/// Result alias that carries the custom [`VisualizerError`] type.
pub type Result<T> = std::result::Result<T, VisualizerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    /// A drawing surface or graphics context could not be acquired. Fatal to
    /// the renderer instance that requested it.
    #[error("{surface} surface unavailable: {reason}")]
    SurfaceUnavailable {
        surface: &'static str,
        reason: String,
    },
    /// A media item failed to load. Renderers recover from this locally.
    #[error("failed to load asset `{url}`: {reason}")]
    AssetLoadFailure { url: String, reason: String },
    /// The source audio could not be decoded.
    #[error("failed to decode audio: {0}")]
    DecodeFailure(String),
    /// Malformed per-tick data. Treated as a programming error by callers.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no media loaded")]
    NoMedia,
    #[error("unknown visualization `{0}`")]
    UnknownVisualization(String),
    /// Configuration rejected before any audio is processed.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl VisualizerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn surface_unavailable(surface: &'static str, reason: impl Into<String>) -> Self {
        Self::SurfaceUnavailable {
            surface,
            reason: reason.into(),
        }
    }
}
