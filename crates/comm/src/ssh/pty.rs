//! Terminal mode encoding for pty requests (RFC 4254 Section 8).
//!
//! A pty-req carries an opaque byte string of encoded terminal modes: a
//! sequence of `(opcode: u8, argument: u32)` pairs terminated by
//! `TTY_OP_END`. Opcodes 1-159 take a single uint32 argument; this layer
//! only emits the opcodes the communicator needs.
//!
//! # Example
//!
//! ```rust
//! use skiff_comm::ssh::pty::{TerminalModes, ECHO, TTY_OP_ISPEED, TTY_OP_OSPEED};
//!
//! let mut modes = TerminalModes::new();
//! modes.set(ECHO, 0);
//! modes.set(TTY_OP_ISPEED, 14400);
//! modes.set(TTY_OP_OSPEED, 14400);
//!
//! let encoded = modes.encode();
//! assert_eq!(encoded.len(), 3 * 5 + 1); // three pairs plus TTY_OP_END
//! ```

use bytes::{BufMut, BytesMut};

/// Terminates the encoded mode list.
pub const TTY_OP_END: u8 = 0;

/// Enable echoing (0 disables local echo).
pub const ECHO: u8 = 53;

/// Terminal input baud rate.
pub const TTY_OP_ISPEED: u8 = 128;

/// Terminal output baud rate.
pub const TTY_OP_OSPEED: u8 = 129;

/// An ordered list of terminal mode overrides.
///
/// Every entry carries an explicit uint32 argument; the encoding has no
/// notion of an omitted value, so callers must supply one for each opcode
/// they set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalModes {
    modes: Vec<(u8, u32)>,
}

impl TerminalModes {
    /// Creates an empty mode list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an opcode to a value, replacing any previous entry for it.
    pub fn set(&mut self, opcode: u8, value: u32) {
        if let Some(entry) = self.modes.iter_mut().find(|(op, _)| *op == opcode) {
            entry.1 = value;
        } else {
            self.modes.push((opcode, value));
        }
    }

    /// Returns the value set for an opcode, if any.
    pub fn get(&self, opcode: u8) -> Option<u32> {
        self.modes
            .iter()
            .find(|(op, _)| *op == opcode)
            .map(|(_, value)| *value)
    }

    /// Returns the number of mode entries.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Returns whether no modes are set.
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Encodes the mode list to the pty-req wire format.
    ///
    /// Format (RFC 4254 Section 8):
    /// ```text
    /// byte      opcode
    /// uint32    argument
    /// ...       (repeated)
    /// byte      TTY_OP_END (0)
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.modes.len() * 5 + 1);

        for (opcode, value) in &self.modes {
            buf.put_u8(*opcode);
            buf.put_u32(*value);
        }
        buf.put_u8(TTY_OP_END);

        buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_modes_encode_to_terminator() {
        let modes = TerminalModes::new();
        assert!(modes.is_empty());
        assert_eq!(modes.encode(), vec![TTY_OP_END]);
    }

    #[test]
    fn test_encoding_layout() {
        let mut modes = TerminalModes::new();
        modes.set(ECHO, 0);
        modes.set(TTY_OP_ISPEED, 14400);

        let encoded = modes.encode();

        assert_eq!(encoded[0], ECHO);
        assert_eq!(u32::from_be_bytes([encoded[1], encoded[2], encoded[3], encoded[4]]), 0);
        assert_eq!(encoded[5], TTY_OP_ISPEED);
        assert_eq!(
            u32::from_be_bytes([encoded[6], encoded[7], encoded[8], encoded[9]]),
            14400
        );
        assert_eq!(*encoded.last().unwrap(), TTY_OP_END);
    }

    #[test]
    fn test_set_replaces_existing_entry() {
        let mut modes = TerminalModes::new();
        modes.set(TTY_OP_OSPEED, 9600);
        modes.set(TTY_OP_OSPEED, 14400);

        assert_eq!(modes.len(), 1);
        assert_eq!(modes.get(TTY_OP_OSPEED), Some(14400));
    }

    #[test]
    fn test_get_unset_opcode() {
        let modes = TerminalModes::new();
        assert_eq!(modes.get(ECHO), None);
    }
}
