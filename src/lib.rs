//! Chainwire is a message framing transport for game clients, operating
//! over reliable, ordered streams such as TCP.
//!
//! Every message travels inside a compact frame: a one-byte protocol code,
//! a little-endian payload length, a per-frame random key, and a checksum,
//! followed by the payload. Payloads are scrambled with a chained byte
//! cipher keyed by a shared one-byte secret and the frame's random key, so
//! identical messages never repeat on the wire and corruption or a key
//! mismatch is caught by the checksum.
//!
//! ## Quick Start
//!
//! The central type is [`Transport`], a synchronous, poll-driven state
//! machine bound to a stream implementing the [`WireStream`] trait.
//!
//! * Sending
//!
//!   [`Transport::send`] encodes a typed message, scrambles it, and writes
//!   the whole frame in one call. [`Transport::send_control`] sends the
//!   smaller unscrambled control frames used for out-of-band signaling.
//!
//! * Receiving
//!
//!   [`Transport::try_recv`] polls for one whole frame and never blocks:
//!   bytes of partially received frames are staged internally and the call
//!   returns [`Error::Incomplete`] until the frame completes.
//!   [`Transport::recv_blocking`] waits for a frame with a deadline, and
//!   [`Transport::try_peek`] inspects a frame without consuming it.
//!
//! [`Transport`] is generic over the stream. [`std::net::TcpStream`] works
//! out of the box; any other reliable, ordered byte stream only needs a
//! [`WireStream`] implementation, which makes the frame logic easy to
//! exercise against in-memory streams in tests.
//!
//! ## Configuration
//!
//! Chainwire provides the [`Config`] struct to configure a [`Transport`].
//! Configuration options include the following:
//!
//! 1. Secret Key
//!
//!    The shared scrambling secret is passed through the [`SecretKey`]
//!    struct. It is a single byte agreed with the server out-of-band. Both
//!    endpoints must use the same key; otherwise, every scrambled frame
//!    fails checksum validation on arrival.
//!
//! 2. Protocol Code
//!
//!    The discriminator carried in the first byte of every frame. Frames
//!    arriving with a different code are rejected before their payload is
//!    touched.
//!
//! 3. Receive Capacity
//!
//!    The size of the staging buffer holding partially received frames
//!    between polls. Receiving reads payloads straight off the stream, so
//!    the capacity bounds peeking, not frame size.
//!
//! For detailed configuration options, refer to the documentation of the
//! [`config`] module.
//!
//! ## Messages
//!
//! Messages are plain-old-data with a fixed little-endian layout described
//! by the [`WireMessage`] trait. The integer primitives and `[u8; N]`
//! implement it out of the box; message structs implement it by encoding
//! their fields in declaration order. By convention the first field is a
//! `u16` message kind, which [`message_kind`] reads from a raw payload for
//! dispatch.
//!
//! Note: the scrambler is an obfuscation and integrity layer, not
//! encryption. Run the transport over an encrypted channel when
//! confidentiality matters.
#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;

mod cipher;
mod codec;
mod specification;
mod staging;
mod transport;

pub use cipher::SecretKey;
pub use codec::{WireMessage, decode, encode, message_kind};
pub use config::Config;
pub use error::Error;
pub use transport::{Connect, Transport, WireStream};
