//! SSH session-layer plumbing for the communicator.
//!
//! The communicator operates strictly above the transport: it is handed an
//! open, authenticated duplex stream and speaks the connection protocol
//! over it. The layering is:
//!
//! 1. **Packet Layer** ([`packet`]) - Binary packet framing (RFC 4253 Section 6)
//! 2. **Connection Layer** ([`connection`], [`mux`]) - Channels and requests (RFC 4254)
//! 3. **Session Layer** ([`session`], [`pty`]) - Per-operation channels, pty modes
//! 4. **Operations** ([`communicator`], [`command`], [`scp`]) - Command start,
//!    file upload, and the sink-protocol framing
//!
//! Key exchange, encryption, and user authentication belong to the layer
//! that produces the connection handle and are not implemented here.
//!
//! # Example
//!
//! ```rust,no_run
//! use skiff_comm::ssh::{Communicator, Connection, RemoteCommand};
//! use std::sync::Arc;
//!
//! # async fn example() -> skiff_platform::SkiffResult<()> {
//! # let (stream, _peer) = tokio::io::duplex(4096);
//! let connection = Arc::new(Connection::new(stream));
//! let comm = Communicator::new(connection);
//!
//! let mut cmd = RemoteCommand::new("hostname");
//! comm.start(&mut cmd).await?;
//! cmd.wait_exited().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253) - SSH Transport Layer Protocol
//! - [RFC 4254](https://datatracker.ietf.org/doc/html/rfc4254) - SSH Connection Protocol

pub mod command;
pub mod communicator;
pub mod connection;
pub mod message;
pub mod mux;
pub mod packet;
pub mod pty;
pub mod scp;
pub mod session;

// Re-export main types
pub use command::RemoteCommand;
pub use communicator::{Communicator, CommunicatorConfig};
pub use connection::{
    ChannelClose, ChannelData, ChannelEof, ChannelExtendedData, ChannelFailure, ChannelOpen,
    ChannelOpenConfirmation, ChannelOpenFailure, ChannelOpenFailureReason, ChannelRequest,
    ChannelRequestType, ChannelSuccess, ChannelWindowAdjust, ExtendedDataType,
    DEFAULT_MAX_PACKET_SIZE, DEFAULT_WINDOW_SIZE, MAX_PACKET_SIZE as MAX_CHANNEL_PACKET_SIZE,
    MAX_WINDOW_SIZE,
};
pub use message::MessageType;
pub use mux::{ChannelMessage, Connection};
pub use packet::Packet;
pub use pty::TerminalModes;
pub use session::{Session, StdinPipe};
