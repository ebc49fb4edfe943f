use thiserror::Error;

/// Error type for RTP packet operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid packet format
    #[error("Invalid RTP packet format: {0}")]
    InvalidPacket(String),

    /// Buffer too small
    #[error("Buffer too small for RTP packet: need {required} but have {available}")]
    BufferTooSmall {
        required: usize,
        available: usize,
    },

    /// Invalid parameter for RTP operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let buffer_err = Error::BufferTooSmall { required: 12, available: 4 };
        assert_eq!(buffer_err.to_string(), "Buffer too small for RTP packet: need 12 but have 4");

        let invalid = Error::InvalidPacket("Invalid RTP version: 1".to_string());
        assert_eq!(invalid.to_string(), "Invalid RTP packet format: Invalid RTP version: 1");
    }
}
