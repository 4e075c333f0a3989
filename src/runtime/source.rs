// Copyright (c) 2018 Fabian Schuiki

//! Seekable input sources.
//!
//! Lexers consume their input one item at a time and occasionally need to
//! step back, for example after overshooting the longest match. The
//! `Seekable` trait captures this forward cursor with bounded rewinding, and
//! `TextSource` adds line and column tracking for character input.

use std::io::{Read, Seek};

use thiserror::Error;

use crate::buffer::{BufferError, RotatingBuffer};
use crate::Position;

/// An error raised when moving a source cursor.
#[derive(Debug, Error)]
pub enum SeekError {
    /// Reversing past the first item of a source that does not clamp.
    #[error("cannot reverse {amount} items at offset {offset}")]
    BeforeStart {
        /// The requested amount.
        amount: usize,
        /// The cursor offset at the time of the request.
        offset: usize,
    },
    /// Reversing further than the backing buffer can ever retain.
    #[error("cannot reverse {amount} items, buffer capacity is {capacity}")]
    ExceedsCapacity {
        /// The requested amount.
        amount: usize,
        /// The buffer capacity.
        capacity: usize,
    },
    /// Reversing into input that has already been evicted from the buffer.
    #[error("cannot reverse {amount} items, only {available} are retained")]
    OutOfWindow {
        /// The requested amount.
        amount: usize,
        /// The number of consumed items still retained.
        available: usize,
    },
    /// The backing buffer or stream failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// A forward cursor over a sequence of items that can step back.
pub trait Seekable {
    /// The type of items produced.
    type Item;

    /// Consume the next item. Returns `false` at the end of the input.
    fn move_next(&mut self) -> Result<bool, SeekError>;

    /// The most recently consumed item, if any.
    fn current(&self) -> Option<Self::Item>;

    /// The number of items consumed so far.
    fn offset(&self) -> usize;

    /// Un-consume the last `amount` items.
    fn reverse(&mut self, amount: usize) -> Result<(), SeekError>;
}

/// A character source that knows the line and column of its cursor.
pub trait TextSource: Seekable<Item = char> {
    /// The position after the most recently consumed character.
    fn position(&self) -> Position;
}

/// An in-memory source over a slice of items.
///
/// Reversing past the start is an error.
#[derive(Debug, Clone)]
pub struct SliceSource<'a, T> {
    items: &'a [T],
    offset: usize,
}

impl<'a, T> SliceSource<'a, T> {
    /// Create a source positioned before the first item.
    pub fn new(items: &'a [T]) -> SliceSource<'a, T> {
        SliceSource { items, offset: 0 }
    }
}

impl<'a, T: Clone> Seekable for SliceSource<'a, T> {
    type Item = T;

    fn move_next(&mut self) -> Result<bool, SeekError> {
        if self.offset < self.items.len() {
            self.offset += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn current(&self) -> Option<T> {
        self.offset
            .checked_sub(1)
            .and_then(|i| self.items.get(i))
            .cloned()
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn reverse(&mut self, amount: usize) -> Result<(), SeekError> {
        if amount > self.offset {
            return Err(SeekError::BeforeStart {
                amount,
                offset: self.offset,
            });
        }
        self.offset -= amount;
        Ok(())
    }
}

/// A line break recorded while advancing, so reversing can restore the
/// column it interrupted.
#[derive(Debug, Clone, Copy)]
struct Break {
    column: usize,
    carriage_return: bool,
    absorbed_lf: bool,
}

/// Line and column bookkeeping that can be replayed backwards.
#[derive(Debug, Clone, Default)]
struct Lines {
    position: Position,
    breaks: Vec<Break>,
}

impl Lines {
    fn advance(&mut self, c: char) {
        match c {
            '\n' if self.position.column == 0 && self.pending_cr() => {
                if let Some(top) = self.breaks.last_mut() {
                    top.absorbed_lf = true;
                }
            }
            '\r' | '\n' => {
                self.breaks.push(Break {
                    column: self.position.column,
                    carriage_return: c == '\r',
                    absorbed_lf: false,
                });
                self.position.line += 1;
                self.position.column = 0;
            }
            _ => self.position.column += 1,
        }
    }

    fn retreat(&mut self, c: char) {
        match c {
            '\n' if self.position.column == 0 && self.absorbed_lf() => {
                if let Some(top) = self.breaks.last_mut() {
                    top.absorbed_lf = false;
                }
            }
            '\r' | '\n' => {
                if let Some(b) = self.breaks.pop() {
                    self.position.line -= 1;
                    self.position.column = b.column;
                }
            }
            _ => self.position.column = self.position.column.saturating_sub(1),
        }
    }

    fn pending_cr(&self) -> bool {
        self.breaks
            .last()
            .map(|b| b.carriage_return && !b.absorbed_lf)
            .unwrap_or(false)
    }

    fn absorbed_lf(&self) -> bool {
        self.breaks.last().map(|b| b.absorbed_lf).unwrap_or(false)
    }
}

/// An in-memory character source with position tracking.
///
/// Reversing past the start clamps to the start.
#[derive(Debug, Clone)]
pub struct StrSource {
    chars: Vec<char>,
    offset: usize,
    lines: Lines,
}

impl StrSource {
    /// Create a source positioned before the first character of `text`.
    pub fn new(text: &str) -> StrSource {
        StrSource {
            chars: text.chars().collect(),
            offset: 0,
            lines: Lines::default(),
        }
    }
}

impl Seekable for StrSource {
    type Item = char;

    fn move_next(&mut self) -> Result<bool, SeekError> {
        match self.chars.get(self.offset) {
            Some(&c) => {
                self.offset += 1;
                self.lines.advance(c);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn current(&self) -> Option<char> {
        self.offset
            .checked_sub(1)
            .and_then(|i| self.chars.get(i))
            .cloned()
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn reverse(&mut self, amount: usize) -> Result<(), SeekError> {
        let target = self.offset.saturating_sub(amount);
        for &c in self.chars[target..self.offset].iter().rev() {
            self.lines.retreat(c);
        }
        self.offset = target;
        Ok(())
    }
}

impl TextSource for StrSource {
    fn position(&self) -> Position {
        self.lines.position
    }
}

/// The default number of bytes requested from the stream at once.
pub const DEFAULT_READ_AMOUNT: usize = 256;
/// The default number of bytes retained for reversing.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// A character source over a byte stream, decoded as Latin-1.
///
/// The stream is read in chunks into a `RotatingBuffer`, so reversing is
/// bounded by the buffer capacity.
#[derive(Debug)]
pub struct StreamSource<R> {
    stream: R,
    buffer: RotatingBuffer,
    read_amount: usize,
    capacity: usize,
    offset: usize,
    exhausted: bool,
    lines: Lines,
}

impl<R: Read + Seek> StreamSource<R> {
    /// Create a source with the default read amount and buffer size.
    pub fn new(stream: R) -> StreamSource<R> {
        StreamSource::with_capacity(stream, DEFAULT_READ_AMOUNT, DEFAULT_BUFFER_SIZE)
    }

    /// Create a source that reads `read_amount` bytes at a time and retains
    /// `buffer_size` bytes for reversing.
    ///
    /// The ring holds `read_amount` bytes on top of `buffer_size`, such that
    /// reading ahead never evicts any of the last `buffer_size` consumed
    /// characters.
    pub fn with_capacity(stream: R, read_amount: usize, buffer_size: usize) -> StreamSource<R> {
        let read_amount = read_amount.max(1);
        let capacity = buffer_size.max(1);
        StreamSource {
            stream,
            buffer: RotatingBuffer::new(capacity + read_amount),
            read_amount,
            capacity,
            offset: 0,
            exhausted: false,
            lines: Lines::default(),
        }
    }

    /// The number of characters that can always be reversed over.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rewind to the first character, seeking the stream back.
    pub fn reset(&mut self) -> Result<(), SeekError> {
        debug!("resetting stream source from offset {}", self.offset);
        let total = self.buffer.total_read();
        self.buffer.go_back(&mut self.stream, total)?;
        self.offset = 0;
        self.exhausted = false;
        self.lines = Lines::default();
        Ok(())
    }

    /// Consume the source and return the underlying stream.
    pub fn into_inner(self) -> R {
        self.stream
    }
}

impl<R: Read + Seek> Seekable for StreamSource<R> {
    type Item = char;

    fn move_next(&mut self) -> Result<bool, SeekError> {
        if self.offset == self.buffer.total_read() {
            if self.exhausted {
                return Ok(false);
            }
            if !self.buffer.read(&mut self.stream, self.read_amount)? {
                self.exhausted = true;
            }
            trace!("buffered up to offset {}", self.buffer.total_read());
            if self.offset == self.buffer.total_read() {
                return Ok(false);
            }
        }
        let c = self.buffer.get(self.offset)? as char;
        self.offset += 1;
        self.lines.advance(c);
        Ok(true)
    }

    fn current(&self) -> Option<char> {
        self.offset
            .checked_sub(1)
            .and_then(|i| self.buffer.get(i).ok())
            .map(|b| b as char)
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn reverse(&mut self, amount: usize) -> Result<(), SeekError> {
        if amount == 0 {
            return Ok(());
        }
        let capacity = self.capacity;
        if amount > capacity {
            return Err(SeekError::ExceedsCapacity { amount, capacity });
        }
        let target = self.offset.saturating_sub(amount);
        let earliest = self.buffer.earliest();
        if target < earliest {
            if target == 0 {
                return self.reset();
            }
            return Err(SeekError::OutOfWindow {
                amount,
                available: self.offset - earliest,
            });
        }
        for index in (target..self.offset).rev() {
            let c = self.buffer.get(index)? as char;
            self.lines.retreat(c);
        }
        self.offset = target;
        Ok(())
    }
}

impl<R: Read + Seek> TextSource for StreamSource<R> {
    fn position(&self) -> Position {
        self.lines.position
    }
}
