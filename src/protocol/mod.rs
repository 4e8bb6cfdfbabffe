//! RESP Protocol Implementation
//!
//! The proxy only ever *reads* request arrays and only ever *writes* replies,
//! so the two directions are modelled separately.
//!
//! ## Modules
//!
//! - `buffer`: chunk queue with a read cursor ([`BufferedInput`])
//! - `parser`: incremental state-machine parser producing [`Command`]s
//! - `command`: the parsed request
//! - `types`: [`ReplyValue`] and its wire encoding
//!
//! ## Example
//!
//! ```
//! use geoproxy::protocol::{ReplyValue, RequestParser};
//! use bytes::Bytes;
//!
//! let mut parser = RequestParser::new();
//! parser.append(Bytes::from_static(b"*2\r\n$3\r\nGET\r\n$4\r\nna"));
//! assert!(parser.next_command().unwrap().is_none());
//!
//! parser.append(Bytes::from_static(b"me\r\n"));
//! let command = parser.next_command().unwrap().unwrap();
//! assert_eq!(command.arg_str(1), Some("name"));
//!
//! let reply = ReplyValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(reply.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod buffer;
pub mod command;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use buffer::BufferedInput;
pub use command::Command;
pub use parser::{ParseError, ParseResult, ParserState, RequestParser};
pub use types::ReplyValue;
