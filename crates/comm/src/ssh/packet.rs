//! SSH binary packet protocol (RFC 4253 Section 6).
//!
//! # Packet Format
//!
//! ```text
//! uint32    packet_length
//! byte      padding_length
//! byte[n1]  payload (n1 = packet_length - padding_length - 1)
//! byte[n2]  random padding (n2 = padding_length)
//! ```
//!
//! # Constraints
//!
//! - `packet_length`: Does NOT include the `packet_length` field itself
//! - `padding_length`: Length of padding (minimum 4, maximum 255 bytes)
//! - Total `packet_length` + 4 (for length field) MUST be multiple of 8
//! - Maximum packet size: 35000 bytes (security limit per RFC 4253)
//!
//! The communicator operates on an already-established connection; MAC and
//! encryption are applied by the transport layer that produced the handle,
//! so packets at this layer carry no MAC field.
//!
//! # Example
//!
//! ```rust
//! use skiff_comm::ssh::Packet;
//!
//! // Create a packet with payload
//! let payload = b"channel message payload";
//! let packet = Packet::new(payload.to_vec());
//!
//! // Serialize to wire format
//! let bytes = packet.to_bytes();
//!
//! // Parse from wire format
//! let parsed = Packet::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.payload(), payload);
//! ```

use bytes::{BufMut, BytesMut};
use rand::RngCore;
use skiff_platform::{SkiffError, SkiffResult};

/// Maximum packet size in bytes (RFC 4253 Section 6.1).
///
/// This limit prevents denial-of-service via extremely large packets.
pub const MAX_PACKET_SIZE: usize = 35000;

/// Minimum padding length in bytes (RFC 4253 Section 6).
pub const MIN_PADDING_LEN: u8 = 4;

/// Maximum padding length in bytes (fits in u8).
pub const MAX_PADDING_LEN: u8 = 255;

/// SSH binary packet.
///
/// Represents an SSH protocol packet as defined in RFC 4253 Section 6.
///
/// # Invariants
///
/// - Padding length is between 4 and 255 bytes
/// - Total packet size (including all fields) is at most 35000 bytes
/// - Packet is aligned to the 8-byte block size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
    padding: Vec<u8>,
}

impl Packet {
    /// Creates a new SSH packet with the given payload.
    ///
    /// The packet will be automatically padded to meet SSH requirements:
    /// - Minimum 4 bytes of padding
    /// - Total packet size is a multiple of 8 bytes
    /// - Padding is filled with random bytes
    ///
    /// # Panics
    ///
    /// Panics if the payload is too large (> 35000 bytes).
    ///
    /// # Example
    ///
    /// ```rust
    /// use skiff_comm::ssh::Packet;
    ///
    /// let packet = Packet::new(b"Hello, SSH!".to_vec());
    /// assert_eq!(packet.payload(), b"Hello, SSH!");
    /// ```
    pub fn new(payload: Vec<u8>) -> Self {
        // packet_length = padding_length (1 byte) + payload + padding
        // total_size = packet_length_field (4 bytes) + packet_length
        // total_size must be a multiple of 8
        let payload_len = payload.len();
        let header_len = 5; // 4 bytes packet_length + 1 byte padding_length

        let unpadded_len = header_len + payload_len;
        let block_size = 8;

        let mut padding_len = MIN_PADDING_LEN as usize;
        while (unpadded_len + padding_len) % block_size != 0 {
            padding_len += 1;
        }

        assert!(
            padding_len <= MAX_PADDING_LEN as usize,
            "Payload too large, cannot add sufficient padding"
        );

        let mut padding = vec![0u8; padding_len];
        rand::thread_rng().fill_bytes(&mut padding);

        let total_size = unpadded_len + padding_len;
        assert!(
            total_size <= MAX_PACKET_SIZE,
            "Packet exceeds maximum size: {} > {}",
            total_size,
            MAX_PACKET_SIZE
        );

        Self { payload, padding }
    }

    /// Returns the packet payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the padding length.
    pub fn padding_len(&self) -> usize {
        self.padding.len()
    }

    /// Serializes the packet to wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        // packet_length = padding_length field + payload + padding
        let packet_length = 1 + self.payload.len() + self.padding.len();

        buf.put_u32(packet_length as u32);
        buf.put_u8(self.padding.len() as u8);
        buf.put_slice(&self.payload);
        buf.put_slice(&self.padding);

        buf.to_vec()
    }

    /// Parses a packet from wire format.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Protocol`] if the data is truncated, oversized,
    /// or carries an invalid padding length.
    pub fn from_bytes(data: &[u8]) -> SkiffResult<Self> {
        if data.len() < 5 {
            return Err(SkiffError::Protocol(format!(
                "Packet too short: {} bytes",
                data.len()
            )));
        }

        let packet_length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if packet_length + 4 > MAX_PACKET_SIZE {
            return Err(SkiffError::Protocol(format!(
                "Packet too large: {} bytes",
                packet_length
            )));
        }

        if data.len() < 4 + packet_length {
            return Err(SkiffError::Protocol(format!(
                "Packet truncated: expected {} bytes, got {}",
                4 + packet_length,
                data.len()
            )));
        }

        let padding_length = data[4] as usize;

        if padding_length < MIN_PADDING_LEN as usize {
            return Err(SkiffError::Protocol(format!(
                "Padding too short: {} bytes",
                padding_length
            )));
        }

        if padding_length + 1 > packet_length {
            return Err(SkiffError::Protocol(format!(
                "Padding length {} exceeds packet length {}",
                padding_length, packet_length
            )));
        }

        let payload_len = packet_length - padding_length - 1;
        let payload = data[5..5 + payload_len].to_vec();
        let padding = data[5 + payload_len..5 + payload_len + padding_length].to_vec();

        Ok(Self { payload, padding })
    }
}
