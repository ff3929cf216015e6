//! SSH protocol message types (RFC 4253).
//!
//! This module defines the message numbers the communicator routes on. The
//! transport-establishment ranges (key exchange, user authentication) belong
//! to the layer that produces the connection handle and are not represented
//! here.
//!
//! # Message Categories
//!
//! - **Transport Layer Generic** (1-19): Disconnect, ignore, debug
//! - **Connection Protocol Generic** (80-127): Channel management
//!
//! # Example
//!
//! ```rust
//! use skiff_comm::ssh::message::MessageType;
//!
//! let msg_type = MessageType::ChannelOpen;
//! assert_eq!(msg_type as u8, 90);
//! ```

/// SSH message types as defined in RFC 4253 Section 12 and RFC 4254.
///
/// Each message type has a unique numeric identifier used in the binary protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    // Transport layer generic (1-19)
    /// Disconnect message - terminates the connection.
    Disconnect = 1,
    /// Ignore message - can be used for padding or keep-alive.
    Ignore = 2,
    /// Debug message - debugging information.
    Debug = 4,

    // Connection protocol generic (80-127)
    /// Channel open.
    ChannelOpen = 90,
    /// Channel open confirmation.
    ChannelOpenConfirmation = 91,
    /// Channel open failure.
    ChannelOpenFailure = 92,
    /// Channel window adjust.
    ChannelWindowAdjust = 93,
    /// Channel data.
    ChannelData = 94,
    /// Channel extended data (stderr).
    ChannelExtendedData = 95,
    /// Channel EOF.
    ChannelEof = 96,
    /// Channel close.
    ChannelClose = 97,
    /// Channel request.
    ChannelRequest = 98,
    /// Channel success.
    ChannelSuccess = 99,
    /// Channel failure.
    ChannelFailure = 100,
}

impl MessageType {
    /// Converts a byte to a message type.
    ///
    /// # Arguments
    ///
    /// * `byte` - The message type byte
    ///
    /// # Returns
    ///
    /// Some(MessageType) if valid, None otherwise.
    ///
    /// # Example
    ///
    /// ```rust
    /// use skiff_comm::ssh::message::MessageType;
    ///
    /// assert_eq!(MessageType::from_u8(94), Some(MessageType::ChannelData));
    /// assert_eq!(MessageType::from_u8(255), None);
    /// ```
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageType::Disconnect),
            2 => Some(MessageType::Ignore),
            4 => Some(MessageType::Debug),
            90 => Some(MessageType::ChannelOpen),
            91 => Some(MessageType::ChannelOpenConfirmation),
            92 => Some(MessageType::ChannelOpenFailure),
            93 => Some(MessageType::ChannelWindowAdjust),
            94 => Some(MessageType::ChannelData),
            95 => Some(MessageType::ChannelExtendedData),
            96 => Some(MessageType::ChannelEof),
            97 => Some(MessageType::ChannelClose),
            98 => Some(MessageType::ChannelRequest),
            99 => Some(MessageType::ChannelSuccess),
            100 => Some(MessageType::ChannelFailure),
            _ => None,
        }
    }
}
