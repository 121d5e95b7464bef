/// Result alias that carries the custom [`WaveGridError`] type.
pub type Result<T> = std::result::Result<T, WaveGridError>;

/// Common error type for the core crate.
///
/// Render and audio failures are recoverable: the animation loop logs them and
/// keeps going. Connection, protocol and configuration failures surface out of
/// startup and are treated as fatal by the binary.
#[derive(Debug, thiserror::Error)]
pub enum WaveGridError {
    /// Discovery or connect failure.
    #[error("connection error: {0}")]
    Connection(String),
    /// A frame could not be rendered, e.g. a row index landed off the grid.
    #[error("render error: {0}")]
    Render(String),
    /// Audio device unavailable or a tone could not be assembled.
    #[error("audio error: {0}")]
    Audio(String),
    /// A collaborator sent a payload we cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl WaveGridError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        Self::Connection(msg.into())
    }

    pub fn render<T: Into<String>>(msg: T) -> Self {
        Self::Render(msg.into())
    }

    pub fn audio<T: Into<String>>(msg: T) -> Self {
        Self::Audio(msg.into())
    }

    pub fn protocol<T: Into<String>>(msg: T) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the animation loop may skip past this error and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Render(_) | Self::Audio(_))
    }
}

impl From<rosc::OscError> for WaveGridError {
    fn from(value: rosc::OscError) -> Self {
        Self::Protocol(format!("{value:?}"))
    }
}
