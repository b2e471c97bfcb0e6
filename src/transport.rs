//! The client transport state machine.

use core::fmt::{self, Debug, Formatter};
use std::{
    io::{self, ErrorKind, Read, Write},
    net::{SocketAddr, TcpStream},
    thread,
    time::{Duration, Instant},
};

use rand::{
    Rng, SeedableRng, TryRngCore,
    rngs::{OsRng, StdRng},
};

use crate::{
    cipher,
    codec::{self, ControlHeader, FrameHeader, HeaderCodec, WireMessage},
    config::Config,
    error::Error,
    specification::{CONTROL_PAYLOAD_MAX_LEN, FRAME_HDR_LEN, FRAME_PAYLOAD_MAX_LEN},
    staging::StagingBuffer,
};

/// Socket bytes are pulled through a scratch buffer of this size.
const READ_CHUNK_LEN: usize = 1024;

/// Sleep between polls of a blocking receive.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A reliable, ordered stream the transport can drive.
///
/// Beyond blocking [`Read`] and [`Write`], the transport needs a
/// non-destructive probe for how many bytes can be read immediately, so its
/// polling receive operations never block.
pub trait WireStream: Read + Write {
    /// Returns how many bytes can be read right now without blocking.
    fn available(&mut self) -> io::Result<usize>;

    /// Returns whether at least one byte can be read without blocking.
    fn data_available(&mut self) -> io::Result<bool> {
        Ok(self.available()? > 0)
    }
}

/// A [`WireStream`] that can establish its own connection.
pub trait Connect: WireStream + Sized {
    /// Connects to the given address.
    fn connect(addr: SocketAddr) -> io::Result<Self>;
}

impl WireStream for TcpStream {
    fn available(&mut self) -> io::Result<usize> {
        const PROBE_LEN: usize = 64 * 1024;

        self.set_nonblocking(true)?;
        let mut probe = [0u8; PROBE_LEN];
        let peeked = self.peek(&mut probe);
        self.set_nonblocking(false)?;
        match peeked {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl Connect for TcpStream {
    fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// A framed, checksum-protected client transport over an ordered stream.
///
/// The `Transport` frames typed messages, scrambles their payloads with the
/// configured secret key, and reassembles incoming frames through a
/// fixed-capacity staging buffer:
///
/// ```text
///      Messages                                      Wire
///      ========                                      ====
///    send()          +----------------------+
///                    |  scramble + frame    +---------->
///          +--------->                      |
///                    |      Transport       |
///          <---------+                      |
///                    |  stage + unscramble  <----------+
///    try_recv()      +----------------------+
/// ```
///
/// * Use [`send`] to scramble and frame an outgoing message. The whole
///   frame is written in one call.
///
/// * Use [`try_recv`] to poll for an incoming frame. Partially received
///   frames are staged internally, and the call returns
///   [`Error::Incomplete`] until the whole frame has arrived; it never
///   blocks.
///
/// The transport is generic over the stream type. Any stream implementing
/// [`WireStream`] can be adopted with [`attach`]; streams that also
/// implement [`Connect`] (such as [`TcpStream`]) let the transport
/// establish the connection itself with [`connect`].
///
/// [`send`]: Transport::send
/// [`try_recv`]: Transport::try_recv
/// [`attach`]: Transport::attach
/// [`connect`]: Transport::connect
/// [`TcpStream`]: std::net::TcpStream
pub struct Transport<S: WireStream> {
    stream: Option<S>,
    staging: StagingBuffer,
    rng: StdRng,
    config: Config,
}

impl<S: WireStream> Transport<S> {
    /// Creates a new `Transport` with the specified `config`.
    ///
    /// For details on constructing and configuring `config`, refer to
    /// the [`config`] module.
    ///
    /// [`config`]: crate::config
    pub fn with_config(config: Config) -> Self {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .expect("system random source failure");
        Self::with_config_and_rng(config, StdRng::from_seed(seed))
    }

    /// Creates a new `Transport` with the specified `config` and random
    /// number generator.
    ///
    /// This method can be used when you need to deterministically construct
    /// a `Transport`. The generator drives the per-frame random keys; for
    /// general use cases, the `with_config` method is recommended.
    pub fn with_config_and_rng(config: Config, rng: StdRng) -> Self {
        let staging = StagingBuffer::with_capacity(config.recv_capacity);
        Self {
            stream: None,
            staging,
            rng,
            config,
        }
    }

    /// Returns whether a stream is currently attached.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connects to `addr` and adopts the resulting stream.
    ///
    /// Does nothing if a stream is already attached.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), Error>
    where
        S: Connect,
    {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = S::connect(addr)?;
        self.attach(stream);
        Ok(())
    }

    /// Adopts an already connected stream, discarding any staged bytes from
    /// a previous connection.
    pub fn attach(&mut self, stream: S) {
        self.staging.clear();
        self.stream = Some(stream);
    }

    /// Drops the attached stream and all staged bytes.
    ///
    /// Does nothing if no stream is attached.
    pub fn disconnect(&mut self) {
        self.stream = None;
        self.staging.clear();
    }

    /// Scrambles, frames, and sends a message.
    ///
    /// With `scramble` set to `false` the payload travels in the clear and
    /// the frame's checksum field is zero; the receiver must then also skip
    /// unscrambling.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] if no stream is attached.
    /// * [`Error::PayloadTooLarge`] if the encoded message exceeds the
    ///   frame length field.
    /// * [`Error::Io`] if the stream fails while writing.
    pub fn send<T: WireMessage>(&mut self, msg: &T, scramble: bool) -> Result<(), Error> {
        self.send_frame(&codec::encode(msg), scramble)
    }

    /// Frames and sends a raw payload. See [`send`].
    ///
    /// [`send`]: Transport::send
    pub fn send_frame(&mut self, payload: &[u8], scramble: bool) -> Result<(), Error> {
        if payload.len() > FRAME_PAYLOAD_MAX_LEN {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: FRAME_PAYLOAD_MAX_LEN,
            });
        }
        let random_key: u8 = self.rng.random();
        let mut frame = vec![0u8; FRAME_HDR_LEN + payload.len()];
        frame[FRAME_HDR_LEN..].copy_from_slice(payload);
        let checksum = if scramble {
            cipher::scramble(
                self.config.secret_key.to_byte(),
                random_key,
                &mut frame[FRAME_HDR_LEN..],
            )
        } else {
            0
        };
        let header = FrameHeader {
            code: self.config.protocol_code,
            payload_len: payload.len() as u16,
            random_key,
            checksum,
        };
        header.write(&mut frame[..FRAME_HDR_LEN]);

        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.write_all(&frame)?;
        stream.flush()?;
        Ok(())
    }

    /// Frames and sends a control message. Control frames carry a
    /// `msg_type` discriminator in the header and are never scrambled.
    ///
    /// # Errors
    ///
    /// Same as [`send`], with the control frame's one-byte length field as
    /// the [`Error::PayloadTooLarge`] limit.
    ///
    /// [`send`]: Transport::send
    pub fn send_control<T: WireMessage>(&mut self, msg_type: u8, msg: &T) -> Result<(), Error> {
        self.send_control_frame(msg_type, &codec::encode(msg))
    }

    /// Frames and sends a raw control payload. See [`send_control`].
    ///
    /// [`send_control`]: Transport::send_control
    pub fn send_control_frame(&mut self, msg_type: u8, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > CONTROL_PAYLOAD_MAX_LEN {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: CONTROL_PAYLOAD_MAX_LEN,
            });
        }
        let header = ControlHeader {
            code: self.config.protocol_code,
            msg_len: (ControlHeader::LEN + payload.len()) as u8,
            msg_type,
        };
        let mut frame = vec![0u8; ControlHeader::LEN + payload.len()];
        header.write(&mut frame[..ControlHeader::LEN]);
        frame[ControlHeader::LEN..].copy_from_slice(payload);

        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.write_all(&frame)?;
        stream.flush()?;
        Ok(())
    }

    /// Writes raw bytes to the stream, bypassing framing entirely.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }

    /// Polls for a message, consuming one whole frame.
    ///
    /// The frame is consumed atomically: until header and payload have both
    /// arrived, the call returns [`Error::Incomplete`] and leaves the stream
    /// state untouched, so calling again later resumes at the same frame
    /// boundary. This function never blocks.
    ///
    /// Only the header passes through the staging buffer; the payload is
    /// read straight off the stream, so frames larger than the staging
    /// capacity are still receivable.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] if no stream is attached.
    /// * [`Error::Incomplete`] if the whole frame has not arrived yet.
    /// * [`Error::ProtocolMismatch`] if the frame code differs from the
    ///   configured protocol code. Nothing is consumed; the stream can no
    ///   longer be assumed frame-aligned.
    /// * [`Error::CorruptFrame`] if `unscramble` is set and checksum
    ///   validation fails. The frame is consumed and discarded.
    /// * [`Error::MalformedPayload`] if the frame's payload length differs
    ///   from `T::ENCODED_LEN`. The frame is consumed.
    /// * [`Error::Io`] if the stream fails while reading.
    pub fn try_recv<T: WireMessage>(&mut self, unscramble: bool) -> Result<T, Error> {
        let payload = self.try_recv_frame(unscramble)?;
        codec::decode(&payload)
    }

    /// Polls for a frame, returning its raw payload. See [`try_recv`].
    ///
    /// [`try_recv`]: Transport::try_recv
    pub fn try_recv_frame(&mut self, unscramble: bool) -> Result<Vec<u8>, Error> {
        let secret = self.config.secret_key.to_byte();
        let code = self.config.protocol_code;
        let (stream, staging) = self.parts()?;
        let (header, mut payload) = recv_frame::<S, FrameHeader>(stream, staging, code)?;
        if unscramble
            && !cipher::unscramble(secret, header.random_key, header.checksum, &mut payload)
        {
            return Err(Error::CorruptFrame);
        }
        Ok(payload)
    }

    /// Polls for a message without consuming it.
    ///
    /// The frame remains buffered and is returned again by the next peek or
    /// receive. Peeking never unscrambles: a scrambled payload is decoded
    /// as the bytes on the wire. Use it for plaintext frames or for
    /// dispatching on a frame before consuming it.
    ///
    /// Unlike [`try_recv`], peeking must hold the whole frame in the
    /// staging buffer; frames larger than the staging capacity fail with
    /// [`Error::BufferFull`].
    ///
    /// [`try_recv`]: Transport::try_recv
    pub fn try_peek<T: WireMessage>(&mut self) -> Result<T, Error> {
        let code = self.config.protocol_code;
        let (stream, staging) = self.parts()?;
        let header = peek_header::<S, FrameHeader>(stream, staging, code)?;
        stage_at_least(stream, staging, FrameHeader::LEN + header.payload_len())?;
        if header.payload_len() != T::ENCODED_LEN {
            return Err(Error::MalformedPayload {
                expected: T::ENCODED_LEN,
                received: header.payload_len(),
            });
        }
        let mut payload = vec![0u8; header.payload_len()];
        staging.peek(&mut payload, FrameHeader::LEN)?;
        Ok(T::decode_from(&payload))
    }

    /// Polls for a control message, returning its `msg_type` discriminator
    /// alongside the decoded message. See [`try_recv`].
    ///
    /// [`try_recv`]: Transport::try_recv
    pub fn try_recv_control<T: WireMessage>(&mut self) -> Result<(u8, T), Error> {
        let (msg_type, payload) = self.try_recv_control_frame()?;
        Ok((msg_type, codec::decode(&payload)?))
    }

    /// Polls for a control frame, returning its `msg_type` discriminator
    /// and raw payload. See [`try_recv`].
    ///
    /// [`try_recv`]: Transport::try_recv
    pub fn try_recv_control_frame(&mut self) -> Result<(u8, Vec<u8>), Error> {
        let code = self.config.protocol_code;
        let (stream, staging) = self.parts()?;
        let (header, payload) = recv_frame::<S, ControlHeader>(stream, staging, code)?;
        Ok((header.msg_type, payload))
    }

    /// Receives a message, blocking until a whole frame arrives or
    /// `timeout` elapses.
    ///
    /// If the deadline passes after the header has already been consumed,
    /// the header is pushed back into the staging buffer so a later receive
    /// resumes at the same frame boundary.
    ///
    /// # Errors
    ///
    /// Same as [`try_recv`], with [`Error::Timeout`] in place of
    /// [`Error::Incomplete`].
    ///
    /// [`try_recv`]: Transport::try_recv
    pub fn recv_blocking<T: WireMessage>(
        &mut self,
        unscramble: bool,
        timeout: Duration,
    ) -> Result<T, Error> {
        let secret = self.config.secret_key.to_byte();
        let code = self.config.protocol_code;
        let deadline = Instant::now() + timeout;

        let header = loop {
            let (stream, staging) = self.parts()?;
            match peek_header::<S, FrameHeader>(stream, staging, code) {
                Ok(header) => break header,
                Err(Error::Incomplete) => {
                    if Instant::now() >= deadline {
                        return Err(Error::Timeout);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(err),
            }
        };

        let mut raw_header = [0u8; FRAME_HDR_LEN];
        self.staging.read(&mut raw_header)?;

        let payload_len = header.payload_len();
        loop {
            let (stream, staging) = self.parts()?;
            match stream.available() {
                Ok(avail) if staging.buffered_len() + avail >= payload_len => break,
                Ok(_) => {
                    if Instant::now() >= deadline {
                        staging.write_front(&raw_header)?;
                        return Err(Error::Timeout);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(err) => {
                    staging.write_front(&raw_header)?;
                    return Err(err.into());
                }
            }
        }
        let (stream, staging) = self.parts()?;
        let mut payload = read_payload(stream, staging, payload_len)?;

        if unscramble
            && !cipher::unscramble(secret, header.random_key, header.checksum, &mut payload)
        {
            return Err(Error::CorruptFrame);
        }
        codec::decode(&payload)
    }

    /// Reads raw bytes, bypassing framing. Staged bytes are drained before
    /// the stream is read. Returns how many bytes were written into `dest`;
    /// never blocks.
    pub fn recv_bytes(&mut self, dest: &mut [u8]) -> Result<usize, Error> {
        let (stream, staging) = self.parts()?;
        let staged = staging.buffered_len().min(dest.len());
        staging.read(&mut dest[..staged])?;
        if staged == dest.len() {
            return Ok(staged);
        }
        let extra = stream.available()?.min(dest.len() - staged);
        if extra > 0 {
            stream.read_exact(&mut dest[staged..staged + extra])?;
        }
        Ok(staged + extra)
    }

    /// Returns how many received bytes are ready right now, staged plus
    /// immediately readable from the stream.
    pub fn available_len(&mut self) -> Result<usize, Error> {
        let (stream, staging) = self.parts()?;
        Ok(staging.buffered_len() + stream.available()?)
    }

    /// Discards all staged bytes and drains whatever the stream currently
    /// holds, realigning the receive side after a protocol mismatch.
    pub fn clear_recv_buffer(&mut self) -> Result<(), Error> {
        let (stream, staging) = self.parts()?;
        staging.clear();
        let mut chunk = [0u8; READ_CHUNK_LEN];
        loop {
            let avail = stream.available()?;
            if avail == 0 {
                return Ok(());
            }
            let n = avail.min(READ_CHUNK_LEN);
            stream.read_exact(&mut chunk[..n])?;
        }
    }

    fn parts(&mut self) -> Result<(&mut S, &mut StagingBuffer), Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        Ok((stream, &mut self.staging))
    }
}

impl<S: WireStream> Debug for Transport<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("connected", &self.stream.is_some())
            .field("staged", &self.staging.buffered_len())
            .finish_non_exhaustive()
    }
}

/// Ensures at least `want` bytes are staged, pulling the shortfall from the
/// stream. Leaves already staged bytes untouched on failure.
fn stage_at_least<S: WireStream>(
    stream: &mut S,
    staging: &mut StagingBuffer,
    want: usize,
) -> Result<(), Error> {
    if staging.buffered_len() >= want {
        return Ok(());
    }
    let shortfall = want - staging.buffered_len();
    if shortfall > staging.free_len() {
        return Err(Error::BufferFull);
    }
    if stream.available()? < shortfall {
        return Err(Error::Incomplete);
    }
    let mut chunk = [0u8; READ_CHUNK_LEN];
    let mut remaining = shortfall;
    while remaining > 0 {
        let n = remaining.min(READ_CHUNK_LEN);
        stream.read_exact(&mut chunk[..n])?;
        staging.write(&chunk[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Peeks a validated header without consuming it.
fn peek_header<S: WireStream, H: HeaderCodec>(
    stream: &mut S,
    staging: &mut StagingBuffer,
    protocol_code: u8,
) -> Result<H, Error> {
    stage_at_least(stream, staging, H::LEN)?;
    let mut raw = [0u8; FRAME_HDR_LEN];
    staging.peek(&mut raw[..H::LEN], 0)?;
    let header = H::parse(&raw[..H::LEN]);
    if header.code() != protocol_code {
        return Err(Error::ProtocolMismatch {
            received: header.code(),
        });
    }
    Ok(header)
}

/// Reads a payload of `payload_len` bytes, draining staged bytes first and
/// pulling the shortfall directly from the stream. The caller must have
/// checked that the shortfall is immediately readable.
fn read_payload<S: WireStream>(
    stream: &mut S,
    staging: &mut StagingBuffer,
    payload_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut payload = vec![0u8; payload_len];
    let staged = staging.buffered_len().min(payload_len);
    staging.read(&mut payload[..staged])?;
    stream.read_exact(&mut payload[staged..])?;
    Ok(payload)
}

/// Consumes one whole frame, returning its header and payload. Until the
/// whole frame is available, nothing is consumed. The payload bypasses the
/// staging buffer where it can, so frames larger than the staging capacity
/// are still receivable.
fn recv_frame<S: WireStream, H: HeaderCodec>(
    stream: &mut S,
    staging: &mut StagingBuffer,
    protocol_code: u8,
) -> Result<(H, Vec<u8>), Error> {
    let header = peek_header::<S, H>(stream, staging, protocol_code)?;
    if staging.buffered_len() + stream.available()? < H::LEN + header.payload_len() {
        return Err(Error::Incomplete);
    }
    staging.consume(H::LEN)?;
    let payload = read_payload(stream, staging, header.payload_len())?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cipher::SecretKey, test::MockStream};

    fn transport_with_seed(seed: u64) -> Transport<MockStream> {
        let config = Config::builder_with_secret_key(SecretKey::new(50))
            .with_default_protocol_code()
            .with_default_recv_capacity();
        let mut transport = Transport::with_config_and_rng(config, StdRng::seed_from_u64(seed));
        transport.attach(MockStream::default());
        transport
    }

    fn wire_of(transport: &mut Transport<MockStream>) -> &mut Vec<u8> {
        &mut transport.stream.as_mut().unwrap().buf
    }

    #[test]
    fn test_not_connected() {
        let config = Config::builder_with_secret_key(SecretKey::new(50))
            .with_default_protocol_code()
            .with_default_recv_capacity();
        let mut transport: Transport<MockStream> = Transport::with_config(config);
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.try_recv::<u32>(true),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            transport.send(&1u32, true),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_scrambled_round_trip() {
        let mut transport = transport_with_seed(7);
        transport.send(&0xDEADBEEFu32, true).unwrap();

        // The plaintext must not appear on the wire.
        let wire = wire_of(&mut transport).clone();
        assert_eq!(wire.len(), FRAME_HDR_LEN + 4);
        assert_eq!(wire[0], 119);
        assert_ne!(&wire[FRAME_HDR_LEN..], &0xDEADBEEFu32.to_le_bytes());

        let msg: u32 = transport.try_recv(true).unwrap();
        assert_eq!(msg, 0xDEADBEEF);
        assert!(matches!(
            transport.try_recv::<u32>(true),
            Err(Error::Incomplete)
        ));
    }

    #[test]
    fn test_plain_round_trip() {
        let mut transport = transport_with_seed(8);
        transport.send(&0x1122334455667788u64, false).unwrap();

        let wire = wire_of(&mut transport).clone();
        assert_eq!(&wire[FRAME_HDR_LEN..], &0x1122334455667788u64.to_le_bytes());
        // An unscrambled frame carries a zero checksum.
        assert_eq!(wire[4], 0);

        let msg: u64 = transport.try_recv(false).unwrap();
        assert_eq!(msg, 0x1122334455667788);
    }

    #[test]
    fn test_split_delivery_resumes() {
        let mut transport = transport_with_seed(9);
        transport.send(&0xABCD1234u32, true).unwrap();
        let frame = wire_of(&mut transport).split_off(0);

        // Header arrives first: it is staged but not consumed.
        wire_of(&mut transport).extend(&frame[..FRAME_HDR_LEN]);
        assert!(matches!(
            transport.try_recv::<u32>(true),
            Err(Error::Incomplete)
        ));

        // The payload arrives later: the staged header still lines up.
        wire_of(&mut transport).extend(&frame[FRAME_HDR_LEN..]);
        let msg: u32 = transport.try_recv(true).unwrap();
        assert_eq!(msg, 0xABCD1234);
    }

    #[test]
    fn test_protocol_mismatch() {
        let mut transport = transport_with_seed(10);
        transport.send(&1u16, true).unwrap();
        wire_of(&mut transport)[0] = 93;

        assert!(matches!(
            transport.try_recv::<u16>(true),
            Err(Error::ProtocolMismatch { received: 93 })
        ));

        // Nothing was consumed; realigning recovers the stream.
        transport.clear_recv_buffer().unwrap();
        assert_eq!(transport.available_len().unwrap(), 0);
        transport.send(&2u16, true).unwrap();
        assert_eq!(transport.try_recv::<u16>(true).unwrap(), 2);
    }

    #[test]
    fn test_corrupt_frame() {
        let mut transport = transport_with_seed(11);
        transport.send(&0x55AA55AAu32, true).unwrap();
        let last = wire_of(&mut transport).len() - 1;
        wire_of(&mut transport)[last] ^= 0x01;

        assert!(matches!(
            transport.try_recv::<u32>(true),
            Err(Error::CorruptFrame)
        ));
        // The corrupt frame was consumed and discarded.
        assert!(matches!(
            transport.try_recv::<u32>(true),
            Err(Error::Incomplete)
        ));
    }

    #[test]
    fn test_malformed_payload_width() {
        let mut transport = transport_with_seed(12);
        transport.send(&7u32, true).unwrap();

        assert!(matches!(
            transport.try_recv::<u64>(true),
            Err(Error::MalformedPayload {
                expected: 8,
                received: 4,
            })
        ));
        // The mismatched frame was consumed at the wire level.
        assert!(matches!(
            transport.try_recv::<u64>(true),
            Err(Error::Incomplete)
        ));
    }

    #[test]
    fn test_large_frame_bypasses_staging() {
        let config = Config::builder_with_secret_key(SecretKey::new(50))
            .with_default_protocol_code()
            .with_recv_capacity(16);
        let mut transport = Transport::with_config_and_rng(config, StdRng::seed_from_u64(13));
        transport.attach(MockStream::default());

        let payload: Vec<u8> = (0u16..64).map(|i| (i * 3) as u8).collect();
        transport.send_frame(&payload, true).unwrap();

        // Peeking needs the whole frame staged, which a 16-byte buffer
        // cannot hold.
        assert!(matches!(
            transport.try_peek::<[u8; 64]>(),
            Err(Error::BufferFull)
        ));

        // Receiving reads the payload straight off the stream.
        assert_eq!(transport.try_recv_frame(true).unwrap(), payload);
    }

    #[test]
    fn test_payload_too_large() {
        let mut transport = transport_with_seed(14);
        let oversized = vec![0u8; FRAME_PAYLOAD_MAX_LEN + 1];
        assert!(matches!(
            transport.send_frame(&oversized, true),
            Err(Error::PayloadTooLarge { .. })
        ));
        assert!(matches!(
            transport.send_control_frame(1, &[0u8; 256]),
            Err(Error::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_control_round_trip() {
        let mut transport = transport_with_seed(15);
        transport.send_control(4, &0x0102030405060708u64).unwrap();

        let wire = wire_of(&mut transport).clone();
        assert_eq!(wire.len(), ControlHeader::LEN + 8);
        assert_eq!(wire[..3], [119, 11, 4]);
        // Control frames are never scrambled.
        assert_eq!(&wire[3..], &0x0102030405060708u64.to_le_bytes());

        let (msg_type, msg): (u8, u64) = transport.try_recv_control().unwrap();
        assert_eq!(msg_type, 4);
        assert_eq!(msg, 0x0102030405060708);
    }

    #[test]
    fn test_peek_then_recv() {
        let mut transport = transport_with_seed(16);
        transport.send(&0x7F00FF00u32, false).unwrap();

        let peeked: u32 = transport.try_peek().unwrap();
        assert_eq!(peeked, 0x7F00FF00);
        // Peeking consumed nothing.
        let peeked_again: u32 = transport.try_peek().unwrap();
        assert_eq!(peeked_again, 0x7F00FF00);
        let msg: u32 = transport.try_recv(false).unwrap();
        assert_eq!(msg, 0x7F00FF00);
    }

    #[test]
    fn test_raw_bytes_round_trip() {
        let mut transport = transport_with_seed(17);
        transport.send_bytes(b"handshake-banner").unwrap();
        assert_eq!(transport.available_len().unwrap(), 16);

        let mut dest = [0u8; 10];
        assert_eq!(transport.recv_bytes(&mut dest).unwrap(), 10);
        assert_eq!(&dest, b"handshake-");
        let mut rest = [0u8; 16];
        assert_eq!(transport.recv_bytes(&mut rest).unwrap(), 6);
        assert_eq!(&rest[..6], b"banner");
    }

    #[test]
    fn test_message_kind_dispatch() {
        let mut transport = transport_with_seed(18);
        let mut payload = codec::encode(&21u16);
        payload.extend_from_slice(&codec::encode(&9000u32));
        transport.send_frame(&payload, true).unwrap();

        let received = transport.try_recv_frame(true).unwrap();
        assert_eq!(codec::message_kind(&received), Some(21));
    }

    #[test]
    fn test_blocking_timeout_without_header() {
        let mut transport = transport_with_seed(19);
        let err = transport
            .recv_blocking::<u32>(true, Duration::from_millis(30))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn test_blocking_requeues_header_on_timeout() {
        let mut transport = transport_with_seed(20);
        transport.send(&0xCAFEBABEu32, true).unwrap();
        let frame = wire_of(&mut transport).split_off(0);

        // Only the header arrives before the deadline.
        wire_of(&mut transport).extend(&frame[..FRAME_HDR_LEN]);
        let err = transport
            .recv_blocking::<u32>(true, Duration::from_millis(30))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));

        // The payload arrives later; the requeued header still lines up.
        wire_of(&mut transport).extend(&frame[FRAME_HDR_LEN..]);
        let msg: u32 = transport
            .recv_blocking(true, Duration::from_millis(100))
            .unwrap();
        assert_eq!(msg, 0xCAFEBABE);
    }

    #[test]
    fn test_disconnect_clears_state() {
        let mut transport = transport_with_seed(21);
        transport.send(&1u32, true).unwrap();
        assert!(transport.is_connected());

        transport.disconnect();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.try_recv::<u32>(true),
            Err(Error::NotConnected)
        ));

        // Reattaching starts from a clean frame boundary.
        transport.attach(MockStream::default());
        transport.send(&2u32, true).unwrap();
        assert_eq!(transport.try_recv::<u32>(true).unwrap(), 2);
    }
}
