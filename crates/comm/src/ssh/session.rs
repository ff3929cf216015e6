//! Per-operation session channels.
//!
//! A [`Session`] is created for exactly one operation (one command run or
//! one upload), is never shared or reused, and is closed deterministically
//! when the operation ends. It owns its message queue exclusively; the
//! connection's reader task feeds the queue.

use crate::ssh::connection::{
    ChannelClose, ChannelData, ChannelEof, ChannelRequest, ChannelRequestType,
    ChannelWindowAdjust, DEFAULT_WINDOW_SIZE,
};
use crate::ssh::mux::{ChannelMap, ChannelMessage, SendHandle};
use crate::ssh::pty::TerminalModes;
use skiff_platform::{SkiffError, SkiffResult};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A session channel bound to one operation.
///
/// Provides pty negotiation, command start, a write pipe for the remote
/// process's stdin, and message consumption with inbound flow-control
/// credit.
pub struct Session {
    /// Channel id on this side
    local_id: u32,
    /// Channel id on the remote side
    remote_id: u32,
    /// Maximum data packet size accepted by the remote side
    remote_max_packet: u32,
    /// Remaining bytes the remote side may send before we grant credit
    recv_window: u32,
    /// Shared transport write handle
    sender: SendHandle,
    /// Message queue fed by the connection reader
    rx: mpsc::UnboundedReceiver<ChannelMessage>,
    /// Channel registry, for unregistering on close
    channels: ChannelMap,
    /// Whether CHANNEL_CLOSE has been sent
    closed: bool,
}

impl Session {
    pub(crate) fn new(
        local_id: u32,
        remote_id: u32,
        _remote_window: u32,
        remote_max_packet: u32,
        sender: SendHandle,
        rx: mpsc::UnboundedReceiver<ChannelMessage>,
        channels: ChannelMap,
    ) -> Self {
        Self {
            local_id,
            remote_id,
            remote_max_packet,
            recv_window: DEFAULT_WINDOW_SIZE,
            sender,
            rx,
            channels,
            closed: false,
        }
    }

    /// Returns the local channel id.
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// Returns the remote channel id.
    pub fn remote_id(&self) -> u32 {
        self.remote_id
    }

    /// Requests a pseudo-terminal on this session.
    ///
    /// # Arguments
    ///
    /// * `term` - Terminal type (e.g. "xterm")
    /// * `width_chars` / `height_rows` - Terminal dimensions in characters
    /// * `modes` - Encoded terminal mode overrides; every opcode carries an
    ///   explicit value
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Protocol`] if the remote side refuses the
    /// request or the channel ends before the reply.
    pub async fn request_pty(
        &mut self,
        term: &str,
        width_chars: u32,
        height_rows: u32,
        modes: &TerminalModes,
    ) -> SkiffResult<()> {
        let request = ChannelRequest::new(
            self.remote_id,
            ChannelRequestType::PtyReq {
                term: term.to_string(),
                width_chars,
                height_rows,
                width_pixels: 0,
                height_pixels: 0,
                modes: modes.encode(),
            },
            true,
        );

        self.sender.send(&request.to_bytes()).await?;
        self.await_reply("pty-req").await
    }

    /// Starts remote execution of a command on this session.
    ///
    /// When this returns, the command has been accepted by the remote side.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Protocol`] if the remote side refuses the
    /// request or the channel ends before the reply.
    pub async fn exec(&mut self, command: &str) -> SkiffResult<()> {
        let request = ChannelRequest::new(
            self.remote_id,
            ChannelRequestType::Exec {
                command: command.to_string(),
            },
            true,
        );

        self.sender.send(&request.to_bytes()).await?;
        self.await_reply("exec").await
    }

    /// Waits for CHANNEL_SUCCESS / CHANNEL_FAILURE after a request.
    async fn await_reply(&mut self, what: &str) -> SkiffResult<()> {
        loop {
            match self.recv().await? {
                ChannelMessage::Success => return Ok(()),
                ChannelMessage::Failure => {
                    return Err(SkiffError::Protocol(format!(
                        "{} request refused by remote side",
                        what
                    )))
                }
                ChannelMessage::Close => {
                    return Err(SkiffError::Protocol(format!(
                        "Channel closed before {} reply",
                        what
                    )))
                }
                other => {
                    trace!("Ignoring {:?} while awaiting {} reply", other, what);
                }
            }
        }
    }

    /// Receives the next channel message.
    ///
    /// Window adjusts from the remote side are folded away internally, and
    /// receive-window credit is granted back once half the window has been
    /// consumed by incoming data.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Protocol`] when the connection has ended and
    /// no further messages can arrive.
    pub async fn recv(&mut self) -> SkiffResult<ChannelMessage> {
        loop {
            let msg = self.rx.recv().await.ok_or_else(|| {
                SkiffError::Protocol("Connection closed".to_string())
            })?;

            match msg {
                ChannelMessage::WindowAdjust(bytes) => {
                    trace!("Remote window grew by {} bytes", bytes);
                    continue;
                }
                ChannelMessage::Data(ref data) => {
                    let len = data.len() as u32;
                    self.grant_credit(len).await?;
                    return Ok(msg);
                }
                ChannelMessage::ExtendedData(ref data) => {
                    let len = data.len() as u32;
                    self.grant_credit(len).await?;
                    return Ok(msg);
                }
                other => return Ok(other),
            }
        }
    }

    /// Debits the receive window and grants credit back when half is spent.
    async fn grant_credit(&mut self, consumed: u32) -> SkiffResult<()> {
        self.recv_window = self.recv_window.saturating_sub(consumed);

        if self.recv_window < DEFAULT_WINDOW_SIZE / 2 {
            let credit = DEFAULT_WINDOW_SIZE - self.recv_window;
            let adjust = ChannelWindowAdjust::new(self.remote_id, credit);
            self.sender.send(&adjust.to_bytes()).await?;
            self.recv_window = DEFAULT_WINDOW_SIZE;
        }

        Ok(())
    }

    /// Returns a write pipe for the remote process's stdin.
    ///
    /// The pipe is independent of the session and may be driven from
    /// another task; closing it sends EOF exactly once.
    pub fn stdin_pipe(&self) -> StdinPipe {
        StdinPipe {
            sender: self.sender.clone(),
            remote_id: self.remote_id,
            // Leave headroom for the data message framing
            max_chunk: (self.remote_max_packet as usize).saturating_sub(16).max(1),
        }
    }

    /// Closes the session channel.
    ///
    /// Sends CHANNEL_CLOSE and unregisters the message queue. Idempotent;
    /// every operation calls this on all of its exit paths.
    pub async fn close(&mut self) -> SkiffResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        debug!("Closing session channel {}", self.local_id);

        let result = self
            .sender
            .send(&ChannelClose::new(self.remote_id).to_bytes())
            .await;
        self.channels.lock().await.remove(&self.local_id);

        result
    }
}

/// Single-use write pipe to a remote process's stdin.
///
/// Writes are framed as CHANNEL_DATA messages chunked to the remote side's
/// maximum packet size. `close` takes the pipe by value: once it has been
/// called nothing can close the pipe a second time, which is the guard the
/// sink protocol's end-of-input signalling depends on.
pub struct StdinPipe {
    sender: SendHandle,
    remote_id: u32,
    max_chunk: usize,
}

impl StdinPipe {
    /// Writes all bytes, splitting them into data frames as needed.
    pub async fn write_all(&mut self, data: &[u8]) -> SkiffResult<()> {
        for chunk in data.chunks(self.max_chunk) {
            let msg = ChannelData::new(self.remote_id, chunk.to_vec());
            self.sender.send(&msg.to_bytes()).await?;
        }
        Ok(())
    }

    /// Closes the pipe, sending CHANNEL_EOF to signal end-of-input.
    ///
    /// Consumes the pipe; a second close is unrepresentable.
    pub async fn close(self) -> SkiffResult<()> {
        self.sender
            .send(&ChannelEof::new(self.remote_id).to_bytes())
            .await
    }
}
