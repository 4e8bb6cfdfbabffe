//! Reply Values and Their Wire Encoding
//!
//! Every reply the proxy sends back is a [`ReplyValue`]. The enum is closed:
//! adding a reply shape means adding a variant and a serialization arm, and the
//! compiler checks every match.
//!
//! ## Protocol Format
//!
//! - `+<text>\r\n` Simple String
//! - `-<text>\r\n` Error (a simple string with the error flag set)
//! - `:<integer>\r\n` Integer
//! - `$<len>\r\n<bytes>\r\n` Bulk String, `$-1\r\n` when null
//! - `*<count>\r\n<elements...>` Array (may be empty, may nest)

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A reply sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyValue {
    /// `+text` or, when `is_error` is set, `-text`.
    SimpleString { text: String, is_error: bool },

    /// Binary-safe string. `None` encodes as the null bulk string `$-1`.
    BulkString(Option<Bytes>),

    /// 64-bit signed integer.
    Integer(i64),

    /// Ordered list of replies. Geo replies nest arrays inside arrays.
    Array(Vec<ReplyValue>),
}

impl ReplyValue {
    /// Creates a non-error simple string.
    ///
    /// # Example
    /// ```
    /// use geoproxy::protocol::ReplyValue;
    /// assert_eq!(ReplyValue::simple_string("OK").serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(text: impl Into<String>) -> Self {
        ReplyValue::SimpleString {
            text: text.into(),
            is_error: false,
        }
    }

    /// Creates an error reply.
    ///
    /// # Example
    /// ```
    /// use geoproxy::protocol::ReplyValue;
    /// let err = ReplyValue::error("ERR unknown command 'FOO'");
    /// assert!(err.is_error());
    /// ```
    pub fn error(text: impl Into<String>) -> Self {
        ReplyValue::SimpleString {
            text: text.into(),
            is_error: true,
        }
    }

    pub fn integer(n: i64) -> Self {
        ReplyValue::Integer(n)
    }

    /// Creates a non-null bulk string.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        ReplyValue::BulkString(Some(data.into()))
    }

    /// The null bulk string, `$-1\r\n`.
    pub fn null() -> Self {
        ReplyValue::BulkString(None)
    }

    pub fn array(values: Vec<ReplyValue>) -> Self {
        ReplyValue::Array(values)
    }

    /// Common response for successful operations
    pub fn ok() -> Self {
        ReplyValue::simple_string("OK")
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            ReplyValue::SimpleString { text, is_error } => {
                buf.push(if *is_error {
                    prefix::ERROR
                } else {
                    prefix::SIMPLE_STRING
                });
                buf.extend_from_slice(text.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            ReplyValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            ReplyValue::BulkString(Some(data)) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            ReplyValue::BulkString(None) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            ReplyValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    /// Returns true if this is the null bulk string.
    pub fn is_null(&self) -> bool {
        matches!(self, ReplyValue::BulkString(None))
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, ReplyValue::SimpleString { is_error: true, .. })
    }

    /// Returns the bulk string payload, if any.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ReplyValue::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ReplyValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ReplyValue]> {
        match self {
            ReplyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }
}

impl fmt::Display for ReplyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyValue::SimpleString {
                text,
                is_error: false,
            } => write!(f, "\"{}\"", text),
            ReplyValue::SimpleString {
                text,
                is_error: true,
            } => write!(f, "(error) {}", text),
            ReplyValue::Integer(n) => write!(f, "(integer) {}", n),
            ReplyValue::BulkString(Some(data)) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            ReplyValue::BulkString(None) => write!(f, "(nil)"),
            ReplyValue::Array(values) => {
                if values.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    writeln!(f)?;
                    for (i, v) in values.iter().enumerate() {
                        writeln!(f, "{}) {}", i + 1, v)?;
                    }
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_string_serialize() {
        assert_eq!(ReplyValue::simple_string("OK").serialize(), b"+OK\r\n");
        assert_eq!(ReplyValue::ok().serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_error_serialize() {
        let value = ReplyValue::error("ERR unknown command 'FOO'");
        assert_eq!(value.serialize(), b"-ERR unknown command 'FOO'\r\n");
        assert!(value.is_error());
    }

    #[test]
    fn test_integer_serialize() {
        assert_eq!(ReplyValue::integer(1000).serialize(), b":1000\r\n");
        assert_eq!(ReplyValue::integer(-2).serialize(), b":-2\r\n");
    }

    #[test]
    fn test_bulk_string_serialize() {
        let value = ReplyValue::bulk_string(Bytes::from("hello"));
        assert_eq!(value.serialize(), b"$5\r\nhello\r\n");

        let empty = ReplyValue::bulk_string(Bytes::new());
        assert_eq!(empty.serialize(), b"$0\r\n\r\n");
    }

    #[test]
    fn test_null_serialize() {
        let value = ReplyValue::null();
        assert!(value.is_null());
        assert_eq!(value.serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_empty_array_serialize() {
        assert_eq!(ReplyValue::array(vec![]).serialize(), b"*0\r\n");
    }

    #[test]
    fn test_nested_array_serialize() {
        // Shape of a GEORADIUS WITHCOORD element: [member, [lng, lat]]
        let value = ReplyValue::array(vec![
            ReplyValue::bulk_string(Bytes::from("shop")),
            ReplyValue::array(vec![
                ReplyValue::bulk_string(Bytes::from("1.5")),
                ReplyValue::bulk_string(Bytes::from("2.5")),
            ]),
        ]);
        assert_eq!(
            value.serialize(),
            b"*2\r\n$4\r\nshop\r\n*2\r\n$3\r\n1.5\r\n$3\r\n2.5\r\n"
        );
    }
}
