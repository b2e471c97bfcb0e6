//! All possible transport errors.
//!
use core::{
    error,
    fmt::{Display, Formatter},
};
use std::io;

/// Enumeration of all possible transport errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Not enough bytes are buffered or available to complete the operation.
    ///
    /// # Suggested error handling strategy
    ///
    /// This error is recoverable. The stream state is unchanged; call the
    /// same operation again once more data has arrived.
    Incomplete,

    /// The staging buffer cannot hold the bytes required by the operation.
    ///
    /// # Suggested error handling strategy
    ///
    /// This error is recoverable. Peeking must hold a whole frame staged,
    /// so a frame larger than the configured receive capacity can be
    /// received but not peeked. Consume the frame instead, or reconfigure
    /// with a larger capacity.
    BufferFull,

    /// The `code` field of an incoming frame does not match the configured
    /// protocol code.
    ///
    /// # Suggested error handling strategy
    ///
    /// This error is fatal for the current frame boundary: the stream can no
    /// longer be trusted to be aligned. Disconnect, or clear the receive
    /// buffer and resynchronize out-of-band.
    ProtocolMismatch {
        /// The received `code` field of the frame.
        received: u8,
    },

    /// Checksum validation failed after unscrambling a frame payload.
    ///
    /// This could be due to the peer using a different secret key or
    /// corruption on the wire. The frame has been consumed and discarded.
    CorruptFrame,

    /// The frame's `payload_len` disagrees with the width of the requested
    /// message type.
    MalformedPayload {
        /// The width of the requested message type.
        expected: usize,
        /// The received `payload_len` field of the frame.
        received: usize,
    },

    /// An outgoing payload exceeds the length field of its frame kind.
    PayloadTooLarge {
        /// The length of the rejected payload.
        len: usize,
        /// The maximum length the frame kind can carry.
        max: usize,
    },

    /// The operation requires a connected stream.
    NotConnected,

    /// An I/O error occurred on the underlying stream.
    ///
    /// # Suggested error handling strategy
    ///
    /// Inspect the [`io::ErrorKind`]. Interrupted and would-block conditions
    /// are already absorbed by the transport, so anything surfacing here is
    /// typically a broken connection.
    ///
    /// [`io::ErrorKind`]: std::io::ErrorKind
    Io(io::Error),

    /// A blocking receive reached its deadline before a whole frame arrived.
    ///
    /// # Suggested error handling strategy
    ///
    /// This error is recoverable. Any partially received frame remains
    /// buffered; call the receive operation again to resume at the same
    /// frame boundary.
    Timeout,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Incomplete => write!(f, "Incomplete"),
            Error::BufferFull => write!(f, "BufferFull"),
            Error::ProtocolMismatch { received } => {
                write!(f, "ProtocolMismatch: received code {}", received)
            }
            Error::CorruptFrame => write!(f, "CorruptFrame"),
            Error::MalformedPayload { expected, received } => write!(
                f,
                "MalformedPayload: expected {} bytes, received {}",
                expected, received
            ),
            Error::PayloadTooLarge { len, max } => {
                write!(f, "PayloadTooLarge: {} bytes, maximum {}", len, max)
            }
            Error::NotConnected => write!(f, "NotConnected"),
            Error::Io(err) => write!(f, "Io: {}", err),
            Error::Timeout => write!(f, "Timeout"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl Error {
    /// Returns `true` if the operation can be retried once more data has
    /// arrived without any cleanup.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Incomplete | Error::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_parameters() {
        let err = Error::ProtocolMismatch { received: 42 };
        assert_eq!(err.to_string(), "ProtocolMismatch: received code 42");

        let err = Error::MalformedPayload {
            expected: 8,
            received: 12,
        };
        assert_eq!(
            err.to_string(),
            "MalformedPayload: expected 8 bytes, received 12"
        );
    }

    #[test]
    fn test_io_error_source() {
        use core::error::Error as _;

        let err = Error::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(err, Error::Io(_)));
        assert!(err.source().is_some());
        assert!(Error::CorruptFrame.source().is_none());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Incomplete.is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(!Error::CorruptFrame.is_retryable());
        assert!(!Error::BufferFull.is_retryable());
    }
}
