//! Remote-execution communicator for the Skiff toolkit.
//!
//! This crate drives two protocols end-to-end against an
//! already-established, authenticated transport connection:
//!
//! - **Command execution** - one session per command, pseudo-terminal
//!   negotiation, streamed input/output, and asynchronous exit reporting
//!   ([`ssh::Communicator::start`]).
//! - **File upload** - one session per upload, driving the legacy
//!   remote-copy sink sub-protocol: control-line framing, binary payload,
//!   single-byte terminator ([`ssh::Communicator::upload`]).
//!
//! Establishing and authenticating the transport is the caller's concern;
//! the connection handle arrives open. Remote file download is explicitly
//! unsupported and fails loudly.
//!
//! # Example
//!
//! ```rust,no_run
//! use skiff_comm::ssh::{Communicator, Connection, RemoteCommand};
//! use std::sync::Arc;
//!
//! # async fn example() -> skiff_platform::SkiffResult<()> {
//! # let (stream, _peer) = tokio::io::duplex(4096);
//! // `stream` is an authenticated transport supplied by the surrounding tool
//! let connection = Arc::new(Connection::new(stream));
//! let comm = Communicator::new(connection);
//!
//! let mut cmd = RemoteCommand::new("echo ok");
//! cmd.set_stdout(Vec::new());
//! comm.start(&mut cmd).await?;
//!
//! assert_eq!(cmd.wait_exited().await?, 0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod ssh;
