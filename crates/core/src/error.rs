/// Errors raised by the control core and by the adapters plugged into it.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Sensor unavailable: {source_name}: {reason}")]
    SensorUnavailable { source_name: String, reason: String },

    #[error("Fan actuation failed: {0}")]
    ActuationFailure(String),

    #[error("Stats recorder I/O failed: {0}")]
    RecorderIo(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Shorthand for building a [`CoreError::SensorUnavailable`].
    pub fn sensor(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SensorUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the core crate.
pub type CoreResult<T> = Result<T, CoreError>;
