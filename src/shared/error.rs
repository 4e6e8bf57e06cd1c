// This is free and unencumbered software released into the public domain.

use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("preview buffers are not prepared")]
    NotPrepared,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("driver error while {context}")]
    DriverError {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl CameraError {
    #[inline]
    pub fn driver(context: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::DriverError {
            context,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    #[inline]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type CameraResult<T = ()> = Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_keeps_its_source() {
        let io = std::io::Error::other("device busy");
        let err = CameraError::driver("spawning the producer", io);
        assert_eq!(err.to_string(), "driver error while spawning the producer");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("device busy"));
    }

    #[test]
    fn helpers_format_messages() {
        assert_eq!(
            CameraError::invalid_config("zero width").to_string(),
            "invalid configuration: zero width"
        );
        assert_eq!(CameraError::unsupported("JPEG").to_string(), "unsupported: JPEG");
    }
}
