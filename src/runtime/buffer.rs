// Copyright (c) 2018 Fabian Schuiki

//! A fixed-capacity circular byte buffer over a seekable stream.

use std::io::{self, Read, Seek, SeekFrom};
use std::ops::{Index, Range};

use thiserror::Error;

/// An error raised when accessing or filling a `RotatingBuffer`.
#[derive(Debug, Error)]
pub enum BufferError {
    /// More bytes were requested in one read than the buffer can hold.
    #[error("cannot read {amount} bytes into a buffer of capacity {capacity}")]
    AmountTooLarge {
        /// The requested amount.
        amount: usize,
        /// The buffer capacity.
        capacity: usize,
    },
    /// The index lies at or beyond the number of bytes read so far.
    #[error("index {index} has not been read yet ({total_read} bytes read)")]
    NotYetRead {
        /// The requested logical index.
        index: usize,
        /// The number of bytes read so far.
        total_read: usize,
    },
    /// The index lies before the oldest retained byte.
    #[error("index {index} has been overwritten (earliest retained is {earliest})")]
    Overwritten {
        /// The requested logical index.
        index: usize,
        /// The oldest logical index still in the buffer.
        earliest: usize,
    },
    /// Going back further than the number of bytes read.
    #[error("cannot go back {amount} bytes, only {total_read} were read")]
    BeforeStart {
        /// The requested amount.
        amount: usize,
        /// The number of bytes read so far.
        total_read: usize,
    },
    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A circular buffer retaining the most recently read bytes of a stream.
///
/// Bytes are addressed by their absolute logical index in the stream, i.e.
/// the number of bytes read before them. Only the last `capacity` bytes are
/// retained; older indices report `BufferError::Overwritten`.
#[derive(Debug, Clone)]
pub struct RotatingBuffer {
    data: Vec<u8>,
    /// Physical index of the oldest retained byte.
    start: usize,
    /// Number of retained bytes.
    len: usize,
    total_read: usize,
}

impl RotatingBuffer {
    /// Create an empty buffer that retains up to `capacity` bytes.
    ///
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> RotatingBuffer {
        RotatingBuffer {
            data: vec![0; capacity.max(1)],
            start: 0,
            len: 0,
            total_read: 0,
        }
    }

    /// The maximum number of bytes retained.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The number of bytes currently retained.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check whether no bytes are retained.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The total number of bytes read, which is one past the newest index.
    pub fn total_read(&self) -> usize {
        self.total_read
    }

    /// The logical index of the oldest retained byte.
    pub fn earliest(&self) -> usize {
        self.total_read - self.len
    }

    /// Read up to `amount` bytes from `stream` into the buffer.
    ///
    /// Evicts the oldest bytes as necessary. Returns `false` if the stream
    /// ran dry before `amount` bytes arrived; whatever did arrive is kept.
    pub fn read<R: Read>(&mut self, stream: &mut R, amount: usize) -> Result<bool, BufferError> {
        let capacity = self.capacity();
        if amount > capacity {
            return Err(BufferError::AmountTooLarge { amount, capacity });
        }
        let mut remaining = amount;
        while remaining > 0 {
            let write = (self.start + self.len) % capacity;
            let chunk = remaining.min(capacity - write);
            let n = match stream.read(&mut self.data[write..write + chunk]) {
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Ok(false);
            }
            let len = self.len + n;
            if len > capacity {
                self.start = (self.start + len - capacity) % capacity;
                self.len = capacity;
            } else {
                self.len = len;
            }
            self.total_read += n;
            remaining -= n;
        }
        Ok(true)
    }

    /// Forget the last `amount` bytes and seek `stream` back by as much.
    ///
    /// The window shrinks accordingly, becoming empty if `amount` covers
    /// every retained byte.
    pub fn go_back<S: Seek>(&mut self, stream: &mut S, amount: usize) -> Result<(), BufferError> {
        if amount > self.total_read {
            return Err(BufferError::BeforeStart {
                amount,
                total_read: self.total_read,
            });
        }
        stream.seek(SeekFrom::Current(-(amount as i64)))?;
        self.total_read -= amount;
        if amount >= self.len {
            self.len = 0;
        } else {
            self.len -= amount;
        }
        Ok(())
    }

    /// Get the byte at logical index `index`.
    pub fn get(&self, index: usize) -> Result<u8, BufferError> {
        if index >= self.total_read {
            return Err(BufferError::NotYetRead {
                index,
                total_read: self.total_read,
            });
        }
        let earliest = self.earliest();
        if index < earliest {
            return Err(BufferError::Overwritten { index, earliest });
        }
        Ok(self.data[(self.start + index - earliest) % self.capacity()])
    }

    /// Copy the bytes of a logical index range out of the buffer.
    pub fn range(&self, range: Range<usize>) -> Result<Vec<u8>, BufferError> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        // Check both ends up front so a partially evicted range fails whole.
        self.get(range.start)?;
        self.get(range.end - 1)?;
        range.map(|i| self.get(i)).collect()
    }
}

impl Index<usize> for RotatingBuffer {
    type Output = u8;

    /// Panics if the index is outside the retained window.
    fn index(&self, index: usize) -> &u8 {
        match self.get(index) {
            Ok(_) => {
                let earliest = self.earliest();
                &self.data[(self.start + index - earliest) % self.capacity()]
            }
            Err(e) => panic!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(len: usize) -> Cursor<Vec<u8>> {
        Cursor::new((0..len).map(|i| i as u8).collect())
    }

    #[test]
    fn reads_wrap_around() {
        let mut s = stream(20);
        let mut buf = RotatingBuffer::new(8);
        assert!(buf.read(&mut s, 5).unwrap());
        assert!(buf.read(&mut s, 5).unwrap());
        assert_eq!(buf.total_read(), 10);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.earliest(), 2);
        assert_eq!(buf.range(2..10).unwrap(), (2..10).collect::<Vec<u8>>());
        assert_eq!(buf[9], 9);
    }

    #[test]
    fn overwritten_range_fails() {
        let mut s = stream(20);
        let mut buf = RotatingBuffer::new(4);
        buf.read(&mut s, 4).unwrap();
        buf.read(&mut s, 3).unwrap();
        match buf.range(2..5) {
            Err(BufferError::Overwritten { index: 2, earliest: 3 }) => (),
            other => panic!("unexpected {:?}", other),
        }
        match buf.get(7) {
            Err(BufferError::NotYetRead { index: 7, total_read: 7 }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn short_stream_reports_partial_read() {
        let mut s = stream(3);
        let mut buf = RotatingBuffer::new(8);
        assert!(!buf.read(&mut s, 5).unwrap());
        assert_eq!(buf.total_read(), 3);
        assert!(buf.read(&mut s, 9).is_err());
    }

    #[test]
    fn go_back_rereads_stream() {
        let mut s = stream(10);
        let mut buf = RotatingBuffer::new(4);
        buf.read(&mut s, 4).unwrap();
        buf.read(&mut s, 4).unwrap();
        buf.go_back(&mut s, 3).unwrap();
        assert_eq!(buf.total_read(), 5);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.get(4).unwrap(), 4);
        buf.read(&mut s, 3).unwrap();
        assert_eq!(buf.range(4..8).unwrap(), vec![4, 5, 6, 7]);
        buf.go_back(&mut s, 8).unwrap();
        assert!(buf.is_empty());
        assert!(buf.go_back(&mut s, 1).is_err());
    }

    #[test]
    #[should_panic]
    fn index_outside_window_panics() {
        let buf = RotatingBuffer::new(4);
        let _ = buf[0];
    }
}
