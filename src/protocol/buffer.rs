//! Buffered Input Reader
//!
//! Network reads arrive as independent chunks. Rather than concatenating them
//! into one growing buffer, the reader keeps the chunks in a queue and walks a
//! cursor across them. Exhausted chunks are dropped as soon as the cursor
//! leaves them, so memory held for a session is bounded by what is still unread.
//!
//! ```text
//!   chunks:  [ ....xxxx ] [ xxxxxxxx ] [ xxx ]
//!                  ^ offset
//!   remaining = 4 + 8 + 3
//! ```
//!
//! Payload bytes handed out by [`BufferedInput::eat_all`] are always copied
//! into a fresh buffer; nothing returned from here aliases a network chunk.

use crate::protocol::parser::{ParseError, ParseResult};
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// A queue of received chunks with a read cursor.
#[derive(Debug, Default)]
pub struct BufferedInput {
    chunks: VecDeque<Bytes>,
    /// Read position inside `chunks[0]`.
    offset: usize,
    /// Unread bytes across all chunks.
    remaining: usize,
}

impl BufferedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a received chunk.
    pub fn append(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.remaining += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Number of unconsumed bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Number of chunks still held.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the next unconsumed byte without advancing.
    pub fn peek(&self) -> ParseResult<u8> {
        match self.chunks.front() {
            Some(chunk) if self.remaining > 0 => Ok(chunk[self.offset]),
            _ => Err(ParseError::Underrun),
        }
    }

    /// Consumes one byte, which must equal `expected`.
    pub fn eat(&mut self, expected: u8) -> ParseResult<()> {
        let found = self.peek()?;
        if found != expected {
            return Err(ParseError::UnexpectedByte { expected, found });
        }
        self.advance(1);
        Ok(())
    }

    /// Consumes exactly `n` bytes into a newly allocated buffer.
    ///
    /// Fails with [`ParseError::Underrun`] without consuming anything if fewer
    /// than `n` bytes are buffered.
    pub fn eat_all(&mut self, n: usize) -> ParseResult<Bytes> {
        if n > self.remaining {
            return Err(ParseError::Underrun);
        }

        let mut dest = BytesMut::with_capacity(n);
        let mut left = n;
        while left > 0 {
            let Some(chunk) = self.chunks.front() else {
                return Err(ParseError::Underrun);
            };
            let take = (chunk.len() - self.offset).min(left);
            dest.extend_from_slice(&chunk[self.offset..self.offset + take]);
            self.advance(take);
            left -= take;
        }

        Ok(dest.freeze())
    }

    /// Discards all buffered chunks and resets the cursor.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.offset = 0;
        self.remaining = 0;
    }

    /// Moves the cursor forward by `n` bytes within the front chunk, releasing
    /// it once fully read.
    fn advance(&mut self, n: usize) {
        self.offset += n;
        self.remaining -= n;
        if let Some(front) = self.chunks.front() {
            if self.offset >= front.len() {
                self.chunks.pop_front();
                self.offset = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_on_empty_is_underrun() {
        let input = BufferedInput::new();
        assert_eq!(input.peek(), Err(ParseError::Underrun));
    }

    #[test]
    fn test_eat_tracks_remaining() {
        let mut input = BufferedInput::new();
        input.append(Bytes::from_static(b"*1"));
        assert_eq!(input.remaining(), 2);

        input.eat(b'*').unwrap();
        assert_eq!(input.remaining(), 1);
        assert_eq!(input.peek(), Ok(b'1'));

        input.eat(b'1').unwrap();
        assert!(input.is_empty());
        assert_eq!(input.chunk_count(), 0);
    }

    #[test]
    fn test_eat_wrong_byte() {
        let mut input = BufferedInput::new();
        input.append(Bytes::from_static(b"x"));
        assert_eq!(
            input.eat(b'*'),
            Err(ParseError::UnexpectedByte {
                expected: b'*',
                found: b'x'
            })
        );
        // Nothing consumed on mismatch
        assert_eq!(input.remaining(), 1);
    }

    #[test]
    fn test_eat_all_crosses_chunks() {
        let mut input = BufferedInput::new();
        input.append(Bytes::from_static(b"he"));
        input.append(Bytes::from_static(b"l"));
        input.append(Bytes::from_static(b"lo!"));
        assert_eq!(input.remaining(), 6);

        let data = input.eat_all(5).unwrap();
        assert_eq!(&data[..], b"hello");
        assert_eq!(input.remaining(), 1);
        // The first two chunks are released, the third is still partially unread
        assert_eq!(input.chunk_count(), 1);
        assert_eq!(input.peek(), Ok(b'!'));
    }

    #[test]
    fn test_eat_all_insufficient_is_underrun() {
        let mut input = BufferedInput::new();
        input.append(Bytes::from_static(b"abc"));
        assert_eq!(input.eat_all(4), Err(ParseError::Underrun));
        assert_eq!(input.remaining(), 3);
    }

    #[test]
    fn test_empty_chunk_is_ignored() {
        let mut input = BufferedInput::new();
        input.append(Bytes::new());
        assert_eq!(input.chunk_count(), 0);
        assert!(input.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut input = BufferedInput::new();
        input.append(Bytes::from_static(b"abc"));
        input.append(Bytes::from_static(b"def"));
        input.eat(b'a').unwrap();
        input.reset();
        assert!(input.is_empty());
        assert_eq!(input.chunk_count(), 0);
        assert_eq!(input.peek(), Err(ParseError::Underrun));
    }
}
