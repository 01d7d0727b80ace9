/// Core error types for the Airmix compositor.

/// A specialized Result type for Airmix operations.
pub type AirmixResult<T> = Result<T, AirmixError>;

/// Top-level error type encompassing all Airmix subsystems.
#[derive(Debug, thiserror::Error)]
pub enum AirmixError {
    #[error("device error: {0}")]
    Device(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("compositor worker has stopped")]
    WorkerStopped,

    #[error("compositor has been shut down")]
    ShutDown,

    #[error("{0}")]
    Other(String),
}

impl AirmixError {
    /// Create a device error.
    pub fn device(message: impl Into<String>) -> Self {
        AirmixError::Device(message.into())
    }

    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        AirmixError::Format(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display() {
        let err = AirmixError::device("out of texture memory");
        assert_eq!(err.to_string(), "device error: out of texture memory");
    }

    #[test]
    fn test_worker_stopped_display() {
        assert!(AirmixError::WorkerStopped.to_string().contains("worker"));
    }

    #[test]
    fn test_io_error_converts() {
        let err: AirmixError = std::io::Error::other("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
