//! Fixed-capacity staging buffer between the socket and the frame parser.

use crate::error::Error;

/// A fixed-capacity byte queue.
///
/// Bytes pulled from the socket are staged here until a whole frame is
/// available, so partially received frames survive across polls. The
/// capacity is fixed at construction and never grows.
///
/// Every operation is atomic: if it returns an error, the buffer is
/// unchanged.
#[derive(Debug)]
pub(crate) struct StagingBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl StagingBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn buffered_len(&self) -> usize {
        self.len
    }

    pub(crate) fn free_len(&self) -> usize {
        self.buf.len() - self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    /// Appends `src` to the buffered bytes.
    pub(crate) fn write(&mut self, src: &[u8]) -> Result<(), Error> {
        if src.len() > self.free_len() {
            return Err(Error::BufferFull);
        }
        self.buf[self.len..self.len + src.len()].copy_from_slice(src);
        self.len += src.len();
        Ok(())
    }

    /// Prepends `src`, shifting the buffered bytes back.
    ///
    /// Used to requeue an already consumed frame header so a later call
    /// resumes at the same frame boundary.
    pub(crate) fn write_front(&mut self, src: &[u8]) -> Result<(), Error> {
        if src.len() > self.free_len() {
            return Err(Error::BufferFull);
        }
        self.buf.copy_within(..self.len, src.len());
        self.buf[..src.len()].copy_from_slice(src);
        self.len += src.len();
        Ok(())
    }

    /// Copies `dest.len()` buffered bytes starting at `offset` without
    /// consuming them.
    pub(crate) fn peek(&self, dest: &mut [u8], offset: usize) -> Result<(), Error> {
        let end = offset.checked_add(dest.len()).ok_or(Error::Incomplete)?;
        if end > self.len {
            return Err(Error::Incomplete);
        }
        dest.copy_from_slice(&self.buf[offset..end]);
        Ok(())
    }

    /// Consumes `dest.len()` bytes from the front, compacting the remainder.
    pub(crate) fn read(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.peek(dest, 0)?;
        self.buf.copy_within(dest.len()..self.len, 0);
        self.len -= dest.len();
        Ok(())
    }

    /// Discards `n` buffered bytes from the front.
    pub(crate) fn consume(&mut self, n: usize) -> Result<(), Error> {
        if n > self.len {
            return Err(Error::Incomplete);
        }
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting() {
        let mut staging = StagingBuffer::with_capacity(8);
        assert_eq!(staging.capacity(), 8);
        assert!(staging.is_empty());
        assert_eq!(staging.free_len(), 8);

        staging.write(&[1, 2, 3]).unwrap();
        assert_eq!(staging.buffered_len(), 3);
        assert_eq!(staging.free_len(), 5);

        staging.clear();
        assert!(staging.is_empty());
    }

    #[test]
    fn test_write_full_is_atomic() {
        let mut staging = StagingBuffer::with_capacity(4);
        staging.write(&[1, 2, 3]).unwrap();
        assert!(matches!(staging.write(&[4, 5]), Err(Error::BufferFull)));
        assert_eq!(staging.buffered_len(), 3);

        let mut out = [0u8; 3];
        staging.read(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn test_read_compacts_front() {
        let mut staging = StagingBuffer::with_capacity(8);
        staging.write(&[10, 20, 30, 40, 50]).unwrap();

        let mut head = [0u8; 2];
        staging.read(&mut head).unwrap();
        assert_eq!(head, [10, 20]);
        assert_eq!(staging.buffered_len(), 3);

        // Freed space is reusable after compaction.
        staging.write(&[60, 70, 80, 90, 100]).unwrap();
        let mut rest = [0u8; 8];
        staging.read(&mut rest).unwrap();
        assert_eq!(rest, [30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut staging = StagingBuffer::with_capacity(8);
        staging.write(&[1, 2, 3, 4]).unwrap();

        let mut mid = [0u8; 2];
        staging.peek(&mut mid, 1).unwrap();
        assert_eq!(mid, [2, 3]);
        assert_eq!(staging.buffered_len(), 4);

        let mut beyond = [0u8; 3];
        assert!(matches!(
            staging.peek(&mut beyond, 2),
            Err(Error::Incomplete)
        ));
    }

    #[test]
    fn test_write_front_restores_consumed_bytes() {
        let mut staging = StagingBuffer::with_capacity(8);
        staging.write(&[1, 2, 3, 4, 5]).unwrap();

        let mut head = [0u8; 2];
        staging.read(&mut head).unwrap();
        staging.write_front(&head).unwrap();

        let mut all = [0u8; 5];
        staging.read(&mut all).unwrap();
        assert_eq!(all, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_consume_discards() {
        let mut staging = StagingBuffer::with_capacity(8);
        staging.write(&[1, 2, 3, 4]).unwrap();
        staging.consume(3).unwrap();
        assert_eq!(staging.buffered_len(), 1);
        assert!(matches!(staging.consume(2), Err(Error::Incomplete)));

        let mut rest = [0u8; 1];
        staging.read(&mut rest).unwrap();
        assert_eq!(rest, [4]);
    }
}
