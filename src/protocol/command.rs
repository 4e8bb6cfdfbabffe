//! Parsed client commands.

use bytes::Bytes;

/// A complete request: the command name followed by its arguments.
///
/// Built by the parser once the declared number of bulk strings has been
/// read, and never modified afterwards. A null bulk string (`$-1`) is stored
/// as an empty argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Builds a command from already-split arguments.
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }

    /// Builds a command from string arguments. Mostly useful in tests.
    pub fn from_strs(args: &[&str]) -> Self {
        Self {
            args: args.iter().map(|a| Bytes::copy_from_slice(a.as_bytes())).collect(),
        }
    }

    /// The command name as sent by the client (original case).
    pub fn name(&self) -> &[u8] {
        self.args.first().map(|b| &b[..]).unwrap_or_default()
    }

    /// Command name lossily decoded, for error messages and logging.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name()).into_owned()
    }

    /// Total number of elements, including the command name.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Element at `index` (0 is the command name).
    pub fn arg(&self, index: usize) -> Option<&Bytes> {
        self.args.get(index)
    }

    /// Element at `index` decoded as UTF-8, if present and valid.
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.arg(index).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }
}
