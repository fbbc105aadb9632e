/// Result alias that carries the custom [`LooperError`] type.
pub type Result<T> = std::result::Result<T, LooperError>;

/// Common error type for the core crate.
///
/// Only setup problems (bad tempo, bad mapping, unreadable files) and thread
/// spawning surface through this type. Runtime anomalies such as an empty loop
/// or a double start are reported through `tracing` and treated as no-ops.
#[derive(Debug, thiserror::Error)]
pub enum LooperError {
    /// Tempo must be a finite, strictly positive number of beats per minute.
    #[error("invalid tempo {0} bpm: must be finite and greater than zero")]
    InvalidTempo(f64),
    /// Invalid application configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// Invalid or incomplete gesture mapping.
    #[error("mapping error: {0}")]
    Mapping(String),
    /// A saved loop file could not be read back.
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    /// Free-form message for the remaining failure paths.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON decoding errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl LooperError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for LooperError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LooperError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
