//! Incremental Request Parser
//!
//! Clients send each command as an array of bulk strings:
//!
//! ```text
//! *<N>\r\n  $<len>\r\n<len bytes>\r\n  ... (N times)
//! ```
//!
//! TCP delivers that byte stream in arbitrary fragments, so the parser is a
//! state machine that can stop at any byte and pick up where it left off when
//! the next chunk is appended:
//!
//! ```text
//!  StartArray ──'*'──> InArraySize ──CRLF──> StartBulkString ──'$'──> InBulkStringSize
//!      ^                                          ^                       │
//!      │                                          │ ($-1 or more args)    │ CRLF
//!      │                                          └───────────────────────┤
//!      └──────── command complete ───── StartBulkStringData <─────────────┘
//! ```
//!
//! [`RequestParser::next_command`] runs the machine while there are unread
//! bytes. It returns `Ok(None)` when a size line or a bulk body is not fully
//! buffered yet; that is the only place parsing ever suspends.
//!
//! Any malformed input is a [`ParseError`]. There is no resynchronisation: the
//! owner is expected to drop the whole connection.

use crate::protocol::buffer::BufferedInput;
use crate::protocol::command::Command;
use crate::protocol::types::prefix;
use bytes::Bytes;
use thiserror::Error;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements in one request array (same as Redis)
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Longest size line we accept before the CRLF.
const MAX_SIZE_DIGITS: usize = 20;

/// Errors that can occur while parsing a request stream.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Not enough buffered bytes. Used internally to suspend; never surfaced
    /// by [`RequestParser::next_command`].
    #[error("input underrun")]
    Underrun,

    /// A structural byte did not match what the grammar requires.
    #[error("expected byte {expected:#04x}, got {found:#04x}")]
    UnexpectedByte { expected: u8, found: u8 },

    /// Array header was not a positive integer.
    #[error("invalid array size: {0:?}")]
    InvalidArraySize(String),

    /// Bulk string header was not an integer >= -1.
    #[error("invalid bulk string length: {0:?}")]
    InvalidBulkLength(String),

    /// The bulk string exceeds maximum allowed size
    #[error("bulk string too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Position of the parser within the request grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    StartArray,
    InArraySize,
    StartBulkString,
    InBulkStringSize,
    StartBulkStringData,
    /// Terminal: the owning session was torn down. All input is ignored.
    Removed,
}

/// Incremental parser for one connection.
#[derive(Debug)]
pub struct RequestParser {
    input: BufferedInput,
    state: ParserState,
    /// Digits of the size line currently being read.
    size_digits: Vec<u8>,
    /// Declared element count of the array being read.
    declared: usize,
    /// Arguments collected so far for the current command.
    args: Vec<Bytes>,
    /// Declared length of the bulk body being waited on.
    bulk_len: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            input: BufferedInput::new(),
            state: ParserState::StartArray,
            size_digits: Vec::with_capacity(MAX_SIZE_DIGITS),
            declared: 0,
            args: Vec::new(),
            bulk_len: 0,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Unconsumed bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.input.remaining()
    }

    /// Appends newly received bytes. Ignored once the parser is removed.
    pub fn append(&mut self, chunk: Bytes) {
        if self.state != ParserState::Removed {
            self.input.append(chunk);
        }
    }

    /// Runs the state machine until a command completes or input runs dry.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(command))` - a full command was read; call again for more
    /// - `Ok(None)` - everything buffered has been consumed or more bytes are needed
    /// - `Err(e)` - the stream is malformed
    pub fn next_command(&mut self) -> ParseResult<Option<Command>> {
        while !self.input.is_empty() {
            match self.state {
                ParserState::StartArray => {
                    self.input.eat(prefix::ARRAY)?;
                    self.state = ParserState::InArraySize;
                }
                ParserState::InArraySize | ParserState::InBulkStringSize => {
                    let t = self.input.peek()?;
                    if t == CR {
                        // Wait until the LF is here too
                        if self.input.remaining() < 2 {
                            return Ok(None);
                        }
                        self.input.eat(CR)?;
                        self.input.eat(LF)?;
                        if let Some(command) = self.end_size()? {
                            return Ok(Some(command));
                        }
                    } else {
                        self.push_size_digit(t)?;
                        self.input.eat(t)?;
                    }
                }
                ParserState::StartBulkString => {
                    self.input.eat(prefix::BULK_STRING)?;
                    self.state = ParserState::InBulkStringSize;
                }
                ParserState::StartBulkStringData => {
                    // body + CR + LF
                    if self.input.remaining() < self.bulk_len + 2 {
                        return Ok(None);
                    }
                    let data = self.input.eat_all(self.bulk_len)?;
                    self.input.eat(CR)?;
                    self.input.eat(LF)?;
                    if let Some(command) = self.push_arg(data) {
                        return Ok(Some(command));
                    }
                }
                ParserState::Removed => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Drops all buffered input and any partially read command.
    pub fn reset(&mut self) {
        self.input.reset();
        self.size_digits.clear();
        self.args = Vec::new();
        self.declared = 0;
        self.bulk_len = 0;
        if self.state != ParserState::Removed {
            self.state = ParserState::StartArray;
        }
    }

    /// Resets and moves to the terminal state.
    pub fn mark_removed(&mut self) {
        self.reset();
        self.state = ParserState::Removed;
    }

    fn push_size_digit(&mut self, t: u8) -> ParseResult<()> {
        self.size_digits.push(t);
        if self.size_digits.len() > MAX_SIZE_DIGITS {
            let text = String::from_utf8_lossy(&self.size_digits).into_owned();
            return Err(match self.state {
                ParserState::InArraySize => ParseError::InvalidArraySize(text),
                _ => ParseError::InvalidBulkLength(text),
            });
        }
        Ok(())
    }

    /// Handles the CRLF that ends a size line.
    fn end_size(&mut self) -> ParseResult<Option<Command>> {
        let text = String::from_utf8_lossy(&self.size_digits).into_owned();
        let parsed = if is_signed_decimal(&self.size_digits) {
            text.parse::<i64>().ok()
        } else {
            None
        };
        self.size_digits.clear();

        if self.state == ParserState::InArraySize {
            let size = match parsed {
                Some(n) if n > 0 && n as usize <= MAX_ARRAY_LEN => n as usize,
                _ => return Err(ParseError::InvalidArraySize(text)),
            };
            self.declared = size;
            self.args = Vec::with_capacity(size.min(64));
            self.state = ParserState::StartBulkString;
            return Ok(None);
        }

        match parsed {
            Some(-1) => Ok(self.push_arg(Bytes::new())),
            Some(n) if n >= 0 => {
                let len = n as usize;
                if len > MAX_BULK_SIZE {
                    return Err(ParseError::MessageTooLarge {
                        size: len,
                        max: MAX_BULK_SIZE,
                    });
                }
                self.bulk_len = len;
                self.state = ParserState::StartBulkStringData;
                Ok(None)
            }
            _ => Err(ParseError::InvalidBulkLength(text)),
        }
    }

    /// Appends an argument, handing out the command once it is complete.
    fn push_arg(&mut self, data: Bytes) -> Option<Command> {
        self.args.push(data);
        if self.args.len() == self.declared {
            self.state = ParserState::StartArray;
            self.declared = 0;
            Some(Command::new(std::mem::take(&mut self.args)))
        } else {
            self.state = ParserState::StartBulkString;
            None
        }
    }
}

/// Optional `-` followed by at least one ASCII digit.
fn is_signed_decimal(text: &[u8]) -> bool {
    let digits = text.strip_prefix(b"-").unwrap_or(text);
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}
