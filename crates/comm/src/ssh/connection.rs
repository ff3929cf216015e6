//! SSH connection protocol messages (RFC 4254).
//!
//! This module implements the channel messages the communicator exchanges
//! with the remote side:
//! - Session channel open/confirmation/failure
//! - Channel data, extended data (stderr), EOF, close
//! - Channel requests: pty-req, exec, exit-status, exit-signal
//! - Channel flow control (window adjust)
//!
//! # Architecture
//!
//! These messages ride on the binary packet layer ([`crate::ssh::packet`])
//! over an already-authenticated transport. Each message provides
//! `to_bytes`/`from_bytes` with strict validation.
//!
//! # Example
//!
//! ```rust
//! use skiff_comm::ssh::connection::ChannelOpen;
//!
//! // Open a session channel
//! let open = ChannelOpen::new(
//!     0,           // sender channel
//!     2097152,     // initial window size (2MB)
//!     32768,       // maximum packet size (32KB)
//! );
//! ```

use bytes::{BufMut, BytesMut};
use skiff_platform::{SkiffError, SkiffResult};

/// Maximum window size (16 MB).
pub const MAX_WINDOW_SIZE: u32 = 16 * 1024 * 1024;

/// Maximum packet size (256 KB).
pub const MAX_PACKET_SIZE: u32 = 256 * 1024;

/// Initial window size announced for new sessions (2 MB).
pub const DEFAULT_WINDOW_SIZE: u32 = 2 * 1024 * 1024;

/// Maximum data packet size announced for new sessions (32 KB).
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 32 * 1024;

/// Channel type name for session channels.
const SESSION_CHANNEL_TYPE: &str = "session";

/// SSH_MSG_CHANNEL_OPEN message (RFC 4254 Section 5.1).
///
/// The communicator only ever opens `session` channels, one per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpen {
    /// Sender channel number
    sender_channel: u32,
    /// Initial window size
    initial_window_size: u32,
    /// Maximum packet size
    maximum_packet_size: u32,
}

impl ChannelOpen {
    /// Creates a new session channel open message.
    ///
    /// # Arguments
    ///
    /// * `sender_channel` - Sender's channel number
    /// * `initial_window_size` - Initial window size (max 16 MB)
    /// * `maximum_packet_size` - Maximum packet size (max 256 KB)
    pub fn new(sender_channel: u32, initial_window_size: u32, maximum_packet_size: u32) -> Self {
        Self {
            sender_channel,
            initial_window_size,
            maximum_packet_size,
        }
    }

    /// Returns the sender channel number.
    pub fn sender_channel(&self) -> u32 {
        self.sender_channel
    }

    /// Returns the initial window size.
    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size
    }

    /// Returns the maximum packet size.
    pub fn maximum_packet_size(&self) -> u32 {
        self.maximum_packet_size
    }

    /// Serializes to bytes.
    ///
    /// Format (RFC 4254 Section 5.1):
    /// ```text
    /// byte      SSH_MSG_CHANNEL_OPEN (90)
    /// string    "session"
    /// uint32    sender channel
    /// uint32    initial window size
    /// uint32    maximum packet size
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(90);
        write_string(&mut buf, SESSION_CHANNEL_TYPE);
        buf.put_u32(self.sender_channel);
        buf.put_u32(self.initial_window_size);
        buf.put_u32(self.maximum_packet_size);

        buf.to_vec()
    }

    /// Parses from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Protocol`] if the data is invalid or the
    /// channel type is not `session`.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 90, "CHANNEL_OPEN")?;

        let mut offset = 1;

        let type_name = read_string(data, &mut offset)?;
        if type_name != SESSION_CHANNEL_TYPE {
            return Err(SkiffError::Protocol(format!(
                "Unsupported channel type: '{}'",
                type_name
            )));
        }

        let sender_channel = read_u32(data, &mut offset)?;
        let initial_window_size = read_u32(data, &mut offset)?;
        let maximum_packet_size = read_u32(data, &mut offset)?;

        if initial_window_size > MAX_WINDOW_SIZE {
            return Err(SkiffError::Protocol(format!(
                "Initial window size {} exceeds maximum {}",
                initial_window_size, MAX_WINDOW_SIZE
            )));
        }

        if maximum_packet_size > MAX_PACKET_SIZE {
            return Err(SkiffError::Protocol(format!(
                "Maximum packet size {} exceeds maximum {}",
                maximum_packet_size, MAX_PACKET_SIZE
            )));
        }

        Ok(Self {
            sender_channel,
            initial_window_size,
            maximum_packet_size,
        })
    }
}

/// SSH_MSG_CHANNEL_OPEN_CONFIRMATION message (RFC 4254 Section 5.1).
///
/// Sent in response to SSH_MSG_CHANNEL_OPEN to confirm the channel opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenConfirmation {
    /// Recipient channel number
    recipient_channel: u32,
    /// Sender channel number
    sender_channel: u32,
    /// Initial window size
    initial_window_size: u32,
    /// Maximum packet size
    maximum_packet_size: u32,
}

impl ChannelOpenConfirmation {
    /// Creates a new channel open confirmation message.
    pub fn new(
        recipient_channel: u32,
        sender_channel: u32,
        initial_window_size: u32,
        maximum_packet_size: u32,
    ) -> Self {
        Self {
            recipient_channel,
            sender_channel,
            initial_window_size,
            maximum_packet_size,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the sender channel number.
    pub fn sender_channel(&self) -> u32 {
        self.sender_channel
    }

    /// Returns the initial window size.
    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size
    }

    /// Returns the maximum packet size.
    pub fn maximum_packet_size(&self) -> u32 {
        self.maximum_packet_size
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(91);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.sender_channel);
        buf.put_u32(self.initial_window_size);
        buf.put_u32(self.maximum_packet_size);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 91, "CHANNEL_OPEN_CONFIRMATION")?;

        let mut offset = 1;

        let recipient_channel = read_u32(data, &mut offset)?;
        let sender_channel = read_u32(data, &mut offset)?;
        let initial_window_size = read_u32(data, &mut offset)?;
        let maximum_packet_size = read_u32(data, &mut offset)?;

        Ok(Self {
            recipient_channel,
            sender_channel,
            initial_window_size,
            maximum_packet_size,
        })
    }
}

/// Channel open failure reason codes (RFC 4254 Section 5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ChannelOpenFailureReason {
    /// Administratively prohibited
    AdministrativelyProhibited = 1,
    /// Connect failed
    ConnectFailed = 2,
    /// Unknown channel type
    UnknownChannelType = 3,
    /// Resource shortage
    ResourceShortage = 4,
}

impl ChannelOpenFailureReason {
    /// Converts from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::AdministrativelyProhibited),
            2 => Some(Self::ConnectFailed),
            3 => Some(Self::UnknownChannelType),
            4 => Some(Self::ResourceShortage),
            _ => None,
        }
    }

    /// Returns the reason as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdministrativelyProhibited => "Administratively prohibited",
            Self::ConnectFailed => "Connect failed",
            Self::UnknownChannelType => "Unknown channel type",
            Self::ResourceShortage => "Resource shortage",
        }
    }
}

/// SSH_MSG_CHANNEL_OPEN_FAILURE message (RFC 4254 Section 5.1).
///
/// Sent in response to SSH_MSG_CHANNEL_OPEN to indicate channel open failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenFailure {
    /// Recipient channel number
    recipient_channel: u32,
    /// Reason code
    reason_code: ChannelOpenFailureReason,
    /// Description
    description: String,
    /// Language tag
    language_tag: String,
}

impl ChannelOpenFailure {
    /// Creates a new channel open failure message.
    pub fn new(recipient_channel: u32, reason_code: ChannelOpenFailureReason) -> Self {
        Self {
            recipient_channel,
            reason_code,
            description: reason_code.as_str().to_string(),
            language_tag: String::new(),
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the reason code.
    pub fn reason_code(&self) -> ChannelOpenFailureReason {
        self.reason_code
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(92);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.reason_code as u32);
        write_string(&mut buf, &self.description);
        write_string(&mut buf, &self.language_tag);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 92, "CHANNEL_OPEN_FAILURE")?;

        let mut offset = 1;

        let recipient_channel = read_u32(data, &mut offset)?;
        let reason_code_u32 = read_u32(data, &mut offset)?;
        let description = read_string(data, &mut offset)?;
        let language_tag = read_string(data, &mut offset)?;

        let reason_code = ChannelOpenFailureReason::from_u32(reason_code_u32).ok_or_else(|| {
            SkiffError::Protocol(format!("Invalid failure reason code: {}", reason_code_u32))
        })?;

        Ok(Self {
            recipient_channel,
            reason_code,
            description,
            language_tag,
        })
    }
}

/// SSH_MSG_CHANNEL_WINDOW_ADJUST message (RFC 4254 Section 5.2).
///
/// Sent to increase the window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWindowAdjust {
    /// Recipient channel number
    recipient_channel: u32,
    /// Bytes to add to window
    bytes_to_add: u32,
}

impl ChannelWindowAdjust {
    /// Creates a new window adjust message.
    pub fn new(recipient_channel: u32, bytes_to_add: u32) -> Self {
        Self {
            recipient_channel,
            bytes_to_add,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the bytes to add.
    pub fn bytes_to_add(&self) -> u32 {
        self.bytes_to_add
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(93);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.bytes_to_add);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 93, "CHANNEL_WINDOW_ADJUST")?;

        let mut offset = 1;

        let recipient_channel = read_u32(data, &mut offset)?;
        let bytes_to_add = read_u32(data, &mut offset)?;

        Ok(Self {
            recipient_channel,
            bytes_to_add,
        })
    }
}

/// SSH_MSG_CHANNEL_DATA message (RFC 4254 Section 5.2).
///
/// Sent to transmit data on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelData {
    /// Recipient channel number
    recipient_channel: u32,
    /// Data to send
    data: Vec<u8>,
}

impl ChannelData {
    /// Creates a new channel data message.
    pub fn new(recipient_channel: u32, data: Vec<u8>) -> Self {
        Self {
            recipient_channel,
            data,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the message and returns the data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(94);
        buf.put_u32(self.recipient_channel);
        write_bytes(&mut buf, &self.data);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 94, "CHANNEL_DATA")?;

        let mut offset = 1;

        let recipient_channel = read_u32(data, &mut offset)?;
        let channel_data = read_bytes(data, &mut offset)?;

        Ok(Self {
            recipient_channel,
            data: channel_data,
        })
    }
}

/// Extended data type code (RFC 4254 Section 5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ExtendedDataType {
    /// Stderr data
    Stderr = 1,
}

impl ExtendedDataType {
    /// Converts from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// SSH_MSG_CHANNEL_EXTENDED_DATA message (RFC 4254 Section 5.2).
///
/// Sent to transmit extended data (stderr) on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelExtendedData {
    /// Recipient channel number
    recipient_channel: u32,
    /// Data type code
    data_type_code: ExtendedDataType,
    /// Data to send
    data: Vec<u8>,
}

impl ChannelExtendedData {
    /// Creates a new channel extended data message.
    pub fn new(recipient_channel: u32, data_type_code: ExtendedDataType, data: Vec<u8>) -> Self {
        Self {
            recipient_channel,
            data_type_code,
            data,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the data type code.
    pub fn data_type_code(&self) -> ExtendedDataType {
        self.data_type_code
    }

    /// Returns the data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the message and returns the data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(95);
        buf.put_u32(self.recipient_channel);
        buf.put_u32(self.data_type_code as u32);
        write_bytes(&mut buf, &self.data);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 95, "CHANNEL_EXTENDED_DATA")?;

        let mut offset = 1;

        let recipient_channel = read_u32(data, &mut offset)?;
        let data_type_code_u32 = read_u32(data, &mut offset)?;
        let channel_data = read_bytes(data, &mut offset)?;

        let data_type_code = ExtendedDataType::from_u32(data_type_code_u32).ok_or_else(|| {
            SkiffError::Protocol(format!("Invalid extended data type: {}", data_type_code_u32))
        })?;

        Ok(Self {
            recipient_channel,
            data_type_code,
            data: channel_data,
        })
    }
}

/// SSH_MSG_CHANNEL_EOF message (RFC 4254 Section 5.3).
///
/// Sent when no more data will be sent on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEof {
    /// Recipient channel number
    recipient_channel: u32,
}

impl ChannelEof {
    /// Creates a new channel EOF message.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(96);
        buf.put_u32(self.recipient_channel);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 96, "CHANNEL_EOF")?;

        let mut offset = 1;
        let recipient_channel = read_u32(data, &mut offset)?;

        Ok(Self { recipient_channel })
    }
}

/// SSH_MSG_CHANNEL_CLOSE message (RFC 4254 Section 5.3).
///
/// Sent to close a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClose {
    /// Recipient channel number
    recipient_channel: u32,
}

impl ChannelClose {
    /// Creates a new channel close message.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(97);
        buf.put_u32(self.recipient_channel);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 97, "CHANNEL_CLOSE")?;

        let mut offset = 1;
        let recipient_channel = read_u32(data, &mut offset)?;

        Ok(Self { recipient_channel })
    }
}

/// Channel request type (RFC 4254 Section 6).
///
/// Only the requests the communicator sends or consumes are represented:
/// pty allocation and exec on the way out, exit reporting on the way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRequestType {
    /// PTY request (pseudoterminal allocation)
    PtyReq {
        /// Terminal type (e.g., "xterm")
        term: String,
        /// Terminal width in characters
        width_chars: u32,
        /// Terminal height in rows
        height_rows: u32,
        /// Terminal width in pixels
        width_pixels: u32,
        /// Terminal height in pixels
        height_pixels: u32,
        /// Encoded terminal modes
        modes: Vec<u8>,
    },
    /// Execute command
    Exec {
        /// Command to execute
        command: String,
    },
    /// Exit status
    ExitStatus {
        /// Exit status code
        exit_status: u32,
    },
    /// Exit signal
    ExitSignal {
        /// Signal name
        signal_name: String,
        /// Core dumped flag
        core_dumped: bool,
        /// Error message
        error_message: String,
        /// Language tag
        language_tag: String,
    },
}

impl ChannelRequestType {
    /// Returns the request type name.
    pub fn name(&self) -> &str {
        match self {
            ChannelRequestType::PtyReq { .. } => "pty-req",
            ChannelRequestType::Exec { .. } => "exec",
            ChannelRequestType::ExitStatus { .. } => "exit-status",
            ChannelRequestType::ExitSignal { .. } => "exit-signal",
        }
    }
}

/// SSH_MSG_CHANNEL_REQUEST message (RFC 4254 Section 6).
///
/// Sent to make a channel-specific request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    /// Recipient channel number
    recipient_channel: u32,
    /// Request type
    request_type: ChannelRequestType,
    /// Want reply flag
    want_reply: bool,
}

impl ChannelRequest {
    /// Creates a new channel request.
    pub fn new(recipient_channel: u32, request_type: ChannelRequestType, want_reply: bool) -> Self {
        Self {
            recipient_channel,
            request_type,
            want_reply,
        }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Returns the request type.
    pub fn request_type(&self) -> &ChannelRequestType {
        &self.request_type
    }

    /// Consumes the message and returns the request type.
    pub fn into_request_type(self) -> ChannelRequestType {
        self.request_type
    }

    /// Returns whether a reply is wanted.
    pub fn want_reply(&self) -> bool {
        self.want_reply
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(98);
        buf.put_u32(self.recipient_channel);
        write_string(&mut buf, self.request_type.name());
        buf.put_u8(if self.want_reply { 1 } else { 0 });

        match &self.request_type {
            ChannelRequestType::PtyReq {
                term,
                width_chars,
                height_rows,
                width_pixels,
                height_pixels,
                modes,
            } => {
                write_string(&mut buf, term);
                buf.put_u32(*width_chars);
                buf.put_u32(*height_rows);
                buf.put_u32(*width_pixels);
                buf.put_u32(*height_pixels);
                write_bytes(&mut buf, modes);
            }
            ChannelRequestType::Exec { command } => {
                write_string(&mut buf, command);
            }
            ChannelRequestType::ExitStatus { exit_status } => {
                buf.put_u32(*exit_status);
            }
            ChannelRequestType::ExitSignal {
                signal_name,
                core_dumped,
                error_message,
                language_tag,
            } => {
                write_string(&mut buf, signal_name);
                buf.put_u8(if *core_dumped { 1 } else { 0 });
                write_string(&mut buf, error_message);
                write_string(&mut buf, language_tag);
            }
        }

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 98, "CHANNEL_REQUEST")?;

        let mut offset = 1;

        let recipient_channel = read_u32(data, &mut offset)?;
        let request_name = read_string(data, &mut offset)?;

        if offset >= data.len() {
            return Err(SkiffError::Protocol(
                "CHANNEL_REQUEST truncated (missing want_reply flag)".to_string(),
            ));
        }
        let want_reply = data[offset] != 0;
        offset += 1;

        let request_type = match request_name.as_str() {
            "pty-req" => {
                let term = read_string(data, &mut offset)?;
                let width_chars = read_u32(data, &mut offset)?;
                let height_rows = read_u32(data, &mut offset)?;
                let width_pixels = read_u32(data, &mut offset)?;
                let height_pixels = read_u32(data, &mut offset)?;
                let modes = read_bytes(data, &mut offset)?;
                ChannelRequestType::PtyReq {
                    term,
                    width_chars,
                    height_rows,
                    width_pixels,
                    height_pixels,
                    modes,
                }
            }
            "exec" => {
                let command = read_string(data, &mut offset)?;
                ChannelRequestType::Exec { command }
            }
            "exit-status" => {
                let exit_status = read_u32(data, &mut offset)?;
                ChannelRequestType::ExitStatus { exit_status }
            }
            "exit-signal" => {
                let signal_name = read_string(data, &mut offset)?;
                let core_dumped = if offset < data.len() {
                    let val = data[offset] != 0;
                    offset += 1;
                    val
                } else {
                    return Err(SkiffError::Protocol(
                        "CHANNEL_REQUEST exit-signal truncated".to_string(),
                    ));
                };
                let error_message = read_string(data, &mut offset)?;
                let language_tag = read_string(data, &mut offset)?;
                ChannelRequestType::ExitSignal {
                    signal_name,
                    core_dumped,
                    error_message,
                    language_tag,
                }
            }
            _ => {
                return Err(SkiffError::Protocol(format!(
                    "Unsupported channel request type: '{}'",
                    request_name
                )))
            }
        };

        Ok(Self {
            recipient_channel,
            request_type,
            want_reply,
        })
    }
}

/// SSH_MSG_CHANNEL_SUCCESS message (RFC 4254 Section 6.4).
///
/// Sent in response to a channel request to indicate success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSuccess {
    /// Recipient channel number
    recipient_channel: u32,
}

impl ChannelSuccess {
    /// Creates a new channel success message.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(99);
        buf.put_u32(self.recipient_channel);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 99, "CHANNEL_SUCCESS")?;

        let mut offset = 1;
        let recipient_channel = read_u32(data, &mut offset)?;

        Ok(Self { recipient_channel })
    }
}

/// SSH_MSG_CHANNEL_FAILURE message (RFC 4254 Section 6.4).
///
/// Sent in response to a channel request to indicate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFailure {
    /// Recipient channel number
    recipient_channel: u32,
}

impl ChannelFailure {
    /// Creates a new channel failure message.
    pub fn new(recipient_channel: u32) -> Self {
        Self { recipient_channel }
    }

    /// Returns the recipient channel number.
    pub fn recipient_channel(&self) -> u32 {
        self.recipient_channel
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(100);
        buf.put_u32(self.recipient_channel);

        buf.to_vec()
    }

    /// Parses from bytes.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        expect_message(data, 100, "CHANNEL_FAILURE")?;

        let mut offset = 1;
        let recipient_channel = read_u32(data, &mut offset)?;

        Ok(Self { recipient_channel })
    }
}

// Helper functions for encoding/decoding

fn expect_message(data: &[u8], msg_type: u8, name: &str) -> SkiffResult<()> {
    if data.is_empty() {
        return Err(SkiffError::Protocol(format!("{} message is empty", name)));
    }

    if data[0] != msg_type {
        return Err(SkiffError::Protocol(format!(
            "Invalid message type: expected {} (SSH_MSG_{}), got {}",
            msg_type, name, data[0]
        )));
    }

    Ok(())
}

fn write_string(buf: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn write_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn read_string(data: &[u8], offset: &mut usize) -> SkiffResult<String> {
    let bytes = read_bytes(data, offset)?;
    String::from_utf8(bytes)
        .map_err(|_| SkiffError::Protocol("String contains invalid UTF-8".to_string()))
}

fn read_bytes(data: &[u8], offset: &mut usize) -> SkiffResult<Vec<u8>> {
    if *offset + 4 > data.len() {
        return Err(SkiffError::Protocol(format!(
            "Cannot read length at offset {}",
            offset
        )));
    }

    let length = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]) as usize;
    *offset += 4;

    if *offset + length > data.len() {
        return Err(SkiffError::Protocol(format!(
            "Data truncated: expected {} bytes at offset {}",
            length, offset
        )));
    }

    let bytes = data[*offset..*offset + length].to_vec();
    *offset += length;

    Ok(bytes)
}

fn read_u32(data: &[u8], offset: &mut usize) -> SkiffResult<u32> {
    if *offset + 4 > data.len() {
        return Err(SkiffError::Protocol(format!(
            "Cannot read u32 at offset {}",
            offset
        )));
    }

    let value = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]);
    *offset += 4;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_open_session() {
        let open = ChannelOpen::new(0, DEFAULT_WINDOW_SIZE, DEFAULT_MAX_PACKET_SIZE);

        assert_eq!(open.sender_channel(), 0);
        assert_eq!(open.initial_window_size(), DEFAULT_WINDOW_SIZE);
        assert_eq!(open.maximum_packet_size(), DEFAULT_MAX_PACKET_SIZE);

        let bytes = open.to_bytes();
        let parsed = ChannelOpen::from_bytes(&bytes).unwrap();

        assert_eq!(parsed, open);
    }

    #[test]
    fn test_channel_open_rejects_other_types() {
        // Hand-build a direct-tcpip open; this layer only speaks sessions
        let mut buf = BytesMut::new();
        buf.put_u8(90);
        write_string(&mut buf, "direct-tcpip");
        buf.put_u32(0);
        buf.put_u32(1024);
        buf.put_u32(1024);

        let result = ChannelOpen::from_bytes(&buf);
        assert!(result.is_err());
    }

    #[test]
    fn test_channel_open_confirmation() {
        let confirm = ChannelOpenConfirmation::new(0, 1, 2097152, 32768);

        let bytes = confirm.to_bytes();
        let parsed = ChannelOpenConfirmation::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
        assert_eq!(parsed.sender_channel(), 1);
        assert_eq!(parsed.initial_window_size(), 2097152);
        assert_eq!(parsed.maximum_packet_size(), 32768);
    }

    #[test]
    fn test_channel_open_failure() {
        let failure =
            ChannelOpenFailure::new(0, ChannelOpenFailureReason::AdministrativelyProhibited);

        let bytes = failure.to_bytes();
        let parsed = ChannelOpenFailure::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
        assert_eq!(
            parsed.reason_code(),
            ChannelOpenFailureReason::AdministrativelyProhibited
        );
        assert_eq!(parsed.description(), "Administratively prohibited");
    }

    #[test]
    fn test_channel_window_adjust() {
        let adjust = ChannelWindowAdjust::new(0, 32768);

        let bytes = adjust.to_bytes();
        let parsed = ChannelWindowAdjust::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
        assert_eq!(parsed.bytes_to_add(), 32768);
    }

    #[test]
    fn test_channel_data() {
        let data = ChannelData::new(0, b"Hello, SSH!".to_vec());

        assert_eq!(data.data(), b"Hello, SSH!");

        let bytes = data.to_bytes();
        let parsed = ChannelData::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
        assert_eq!(parsed.data(), b"Hello, SSH!");
    }

    #[test]
    fn test_channel_data_with_nul_bytes() {
        let payload = vec![0x00, 0x43, 0x00, 0xFF, 0x00];
        let data = ChannelData::new(3, payload.clone());

        let bytes = data.to_bytes();
        let parsed = ChannelData::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.data(), payload.as_slice());
    }

    #[test]
    fn test_channel_extended_data() {
        let data = ChannelExtendedData::new(0, ExtendedDataType::Stderr, b"Error!".to_vec());

        let bytes = data.to_bytes();
        let parsed = ChannelExtendedData::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
        assert_eq!(parsed.data_type_code(), ExtendedDataType::Stderr);
        assert_eq!(parsed.data(), b"Error!");
    }

    #[test]
    fn test_channel_eof() {
        let eof = ChannelEof::new(0);

        let bytes = eof.to_bytes();
        let parsed = ChannelEof::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
    }

    #[test]
    fn test_channel_close() {
        let close = ChannelClose::new(0);

        let bytes = close.to_bytes();
        let parsed = ChannelClose::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
    }

    #[test]
    fn test_channel_request_exec() {
        let request = ChannelRequest::new(
            0,
            ChannelRequestType::Exec {
                command: "ls -la".to_string(),
            },
            true,
        );

        assert!(request.want_reply());

        let bytes = request.to_bytes();
        let parsed = ChannelRequest::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
        assert!(parsed.want_reply());

        if let ChannelRequestType::Exec { command } = parsed.request_type() {
            assert_eq!(command, "ls -la");
        } else {
            panic!("Expected Exec request type");
        }
    }

    #[test]
    fn test_channel_request_pty() {
        let request = ChannelRequest::new(
            0,
            ChannelRequestType::PtyReq {
                term: "xterm".to_string(),
                width_chars: 80,
                height_rows: 40,
                width_pixels: 0,
                height_pixels: 0,
                modes: vec![0],
            },
            true,
        );

        let bytes = request.to_bytes();
        let parsed = ChannelRequest::from_bytes(&bytes).unwrap();

        if let ChannelRequestType::PtyReq {
            term,
            width_chars,
            height_rows,
            ..
        } = parsed.request_type()
        {
            assert_eq!(term, "xterm");
            assert_eq!(*width_chars, 80);
            assert_eq!(*height_rows, 40);
        } else {
            panic!("Expected PtyReq request type");
        }
    }

    #[test]
    fn test_channel_request_exit_status() {
        let request =
            ChannelRequest::new(0, ChannelRequestType::ExitStatus { exit_status: 7 }, false);

        let bytes = request.to_bytes();
        let parsed = ChannelRequest::from_bytes(&bytes).unwrap();

        if let ChannelRequestType::ExitStatus { exit_status } = parsed.request_type() {
            assert_eq!(*exit_status, 7);
        } else {
            panic!("Expected ExitStatus request type");
        }
    }

    #[test]
    fn test_channel_request_exit_signal() {
        let request = ChannelRequest::new(
            0,
            ChannelRequestType::ExitSignal {
                signal_name: "KILL".to_string(),
                core_dumped: false,
                error_message: "killed".to_string(),
                language_tag: String::new(),
            },
            false,
        );

        let bytes = request.to_bytes();
        let parsed = ChannelRequest::from_bytes(&bytes).unwrap();

        if let ChannelRequestType::ExitSignal { signal_name, .. } = parsed.request_type() {
            assert_eq!(signal_name, "KILL");
        } else {
            panic!("Expected ExitSignal request type");
        }
    }

    #[test]
    fn test_channel_request_unsupported() {
        let mut buf = BytesMut::new();
        buf.put_u8(98);
        buf.put_u32(0);
        write_string(&mut buf, "subsystem");
        buf.put_u8(1);
        write_string(&mut buf, "sftp");

        let result = ChannelRequest::from_bytes(&buf);
        assert!(result.is_err());
    }

    #[test]
    fn test_channel_success() {
        let success = ChannelSuccess::new(0);

        let bytes = success.to_bytes();
        let parsed = ChannelSuccess::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
    }

    #[test]
    fn test_channel_failure() {
        let failure = ChannelFailure::new(0);

        let bytes = failure.to_bytes();
        let parsed = ChannelFailure::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.recipient_channel(), 0);
    }

    #[test]
    fn test_wrong_message_type_rejected() {
        let eof = ChannelEof::new(5).to_bytes();
        assert!(ChannelClose::from_bytes(&eof).is_err());
        assert!(ChannelData::from_bytes(&eof).is_err());
    }
}
