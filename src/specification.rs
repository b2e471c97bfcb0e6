//! The informal specification of the chainwire framing protocol.

// Full frame, multi-byte fields little-endian:
// ```text
// | code | payload_len | random_key | checksum |  payload |
// |  1B  |     2B      |     1B     |    1B    | variable |
// |                <- header ->                | <- body ->|
// |                         <- frame ->                   |
// ```
// `payload_len` counts only the payload bytes. The payload on the wire is
// scrambled with the chained cipher keyed by `random_key` and the shared
// secret; `checksum` is the chain seed that validates it.
pub(crate) const FRAME_HDR_LEN: usize = 1 + 2 + 1 + 1; // 5
pub(crate) const FRAME_PAYLOAD_MAX_LEN: usize = u16::MAX as usize;
#[allow(unused)]
pub(crate) const FRAME_MAX_LEN: usize = FRAME_HDR_LEN + FRAME_PAYLOAD_MAX_LEN;

// Control frame, never scrambled:
// ```text
// | code | msg_len | msg_type |  payload |
// |  1B  |   1B    |    1B    | variable |
// |        <- header ->       | <- body ->|
// |                <- frame ->            |
// ```
// `msg_len` counts the whole frame, header included.
pub(crate) const CONTROL_HDR_LEN: usize = 1 + 1 + 1; // 3
pub(crate) const CONTROL_PAYLOAD_MAX_LEN: usize = u8::MAX as usize - CONTROL_HDR_LEN;

/// Default frame discriminator carried in the `code` field.
pub(crate) const DEFAULT_PROTOCOL_CODE: u8 = 119;

/// Default shared scrambling secret.
pub(crate) const DEFAULT_SECRET_KEY: u8 = 50;

/// Default capacity of the receive staging buffer.
pub(crate) const DEFAULT_RECV_CAPACITY: usize = 10_000;
