//! Configuration structures for setting up a [`Transport`].
//!
//! To build a config, you should make three decisions in order:
//!
//! 1. Agree on a one-byte [`SecretKey`] with the server through an
//!    out-of-band mechanism. Both endpoints must use the same key;
//!    otherwise, every scrambled frame fails checksum validation.
//! 2. Choose the protocol code carried in the `code` field of every frame.
//!    Both endpoints must use the same code.
//! 3. Choose the receive staging capacity. It bounds how many bytes of
//!    partially received frames the transport holds between polls.
//!
//! # Example
//!
//! Create a configuration with the default protocol code and capacity:
//! ```
//! use chainwire::{Config, SecretKey};
//!
//! let config = Config::builder_with_secret_key(SecretKey::new(50))
//!     .with_default_protocol_code()
//!     .with_default_recv_capacity();
//! ```
//!
//! Create a configuration for a server speaking a different code, with a
//! larger staging capacity:
//! ```
//! use chainwire::{Config, SecretKey};
//!
//! let config = Config::builder_with_secret_key(SecretKey::new(50))
//!     .with_protocol_code(93)
//!     .with_recv_capacity(64 * 1024);
//! ```
//!
//! [`Transport`]: crate::Transport
use crate::{
    cipher::SecretKey,
    specification::{DEFAULT_PROTOCOL_CODE, DEFAULT_RECV_CAPACITY},
};

/// Configuration structure for setting up a [`Transport`].
///
/// For details on constructing and configuring `config`, refer to
/// the [`config`] module.
///
/// [`config`]: crate::config
/// [`Transport`]: crate::Transport
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Config {
    pub(crate) secret_key: SecretKey,
    pub(crate) protocol_code: u8,
    pub(crate) recv_capacity: usize,
}

/// A builder for creating a [`Config`] instance.
///
/// To get a [`ConfigBuilder`], use [`Config::builder_with_secret_key`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConfigBuilder<State> {
    state: State,
}

impl Config {
    /// Sets up a secret key.
    pub fn builder_with_secret_key(secret_key: SecretKey) -> ConfigBuilder<WantsProtocolCode> {
        ConfigBuilder {
            state: WantsProtocolCode { secret_key },
        }
    }
}

impl ConfigBuilder<WantsProtocolCode> {
    /// Sets up the protocol code carried in every frame.
    ///
    /// The client and server must use the same code.
    pub fn with_protocol_code(self, protocol_code: u8) -> ConfigBuilder<WantsRecvCapacity> {
        ConfigBuilder {
            state: WantsRecvCapacity {
                secret_key: self.state.secret_key,
                protocol_code,
            },
        }
    }

    /// Use the default protocol code.
    pub fn with_default_protocol_code(self) -> ConfigBuilder<WantsRecvCapacity> {
        self.with_protocol_code(DEFAULT_PROTOCOL_CODE)
    }
}

impl ConfigBuilder<WantsRecvCapacity> {
    /// Sets up the receive staging capacity in bytes.
    ///
    /// Receiving reads payloads straight off the stream, so the capacity
    /// does not limit frame size. Peeking, however, must hold the whole
    /// frame staged; peeking a frame larger than this capacity surfaces
    /// as [`Error::BufferFull`].
    ///
    /// ## Panic
    /// Panics if `capacity` cannot hold a frame header.
    ///
    /// [`Error::BufferFull`]: crate::Error::BufferFull
    pub fn with_recv_capacity(self, capacity: usize) -> Config {
        assert!(capacity >= crate::specification::FRAME_HDR_LEN);
        Config {
            secret_key: self.state.secret_key,
            protocol_code: self.state.protocol_code,
            recv_capacity: capacity,
        }
    }

    /// Use the default receive staging capacity (10000 bytes).
    pub fn with_default_recv_capacity(self) -> Config {
        self.with_recv_capacity(DEFAULT_RECV_CAPACITY)
    }
}

/// Config builder state where the caller must supply a protocol code.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct WantsProtocolCode {
    secret_key: SecretKey,
}

/// Config builder state where the caller must supply a receive capacity.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct WantsRecvCapacity {
    secret_key: SecretKey,
    protocol_code: u8,
}
