//! Connection multiplexer.
//!
//! Owns an already-established, authenticated transport stream and
//! multiplexes independent session channels over it. The write half is
//! shared behind a mutex; the read half is consumed by a spawned reader
//! task that parses packets and routes channel messages to per-session
//! queues.
//!
//! The handle is the only state shared between concurrent operations:
//! several sessions may be opened from multiple tasks at once, and each
//! session owns its queue exclusively.

use crate::ssh::connection::{
    ChannelData, ChannelExtendedData, ChannelOpen, ChannelOpenConfirmation, ChannelOpenFailure,
    ChannelOpenFailureReason, ChannelRequest, ChannelRequestType, ChannelWindowAdjust,
    DEFAULT_MAX_PACKET_SIZE, DEFAULT_WINDOW_SIZE,
};
use crate::ssh::message::MessageType;
use crate::ssh::packet::{Packet, MAX_PACKET_SIZE};
use crate::ssh::session::Session;
use skiff_platform::{SkiffError, SkiffResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Message delivered to a session's queue by the reader task.
#[derive(Debug)]
pub enum ChannelMessage {
    /// The remote side confirmed the channel open.
    OpenConfirmation {
        /// Channel id on the remote side
        remote_id: u32,
        /// Window size announced by the remote side
        initial_window_size: u32,
        /// Maximum data packet size accepted by the remote side
        maximum_packet_size: u32,
    },
    /// The remote side refused the channel open.
    OpenFailure {
        /// Failure reason code
        reason: ChannelOpenFailureReason,
        /// Human-readable description
        description: String,
    },
    /// Data received on this channel (the remote process's stdout)
    Data(Vec<u8>),
    /// Extended data received on this channel (the remote process's stderr)
    ExtendedData(Vec<u8>),
    /// The remote side granted additional window space
    WindowAdjust(u32),
    /// Channel EOF
    Eof,
    /// Channel close
    Close,
    /// Channel request succeeded
    Success,
    /// Channel request failed
    Failure,
    /// The remote process exited with the given status
    ExitStatus(u32),
    /// The remote process was terminated by a signal
    ExitSignal {
        /// Signal name (without the "SIG" prefix)
        signal_name: String,
        /// Whether a core dump was produced
        core_dumped: bool,
    },
}

/// Registry of open channels: local channel id to message queue.
pub(crate) type ChannelMap = Arc<Mutex<HashMap<u32, mpsc::UnboundedSender<ChannelMessage>>>>;

/// Cloneable handle to the shared write half of the transport.
///
/// Every payload is framed as a binary packet before being written; the
/// mutex serializes whole packets, so frames from concurrent sessions never
/// interleave mid-packet.
#[derive(Clone)]
pub(crate) struct SendHandle {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl SendHandle {
    /// Wraps the write half of a transport stream.
    pub(crate) fn new(writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Frames and sends one message payload.
    pub(crate) async fn send(&self, payload: &[u8]) -> SkiffResult<()> {
        let bytes = Packet::new(payload.to_vec()).to_bytes();

        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;

        Ok(())
    }

    /// Shuts down the write half of the transport.
    pub(crate) async fn shutdown(&self) -> SkiffResult<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

/// The caller-owned connection handle.
///
/// Wraps an open, authenticated duplex stream and produces independent
/// [`Session`]s over it. The connection outlives any single operation and
/// is never owned by the communicator; sessions are ephemeral and closed
/// per operation.
///
/// # Example
///
/// ```rust,no_run
/// use skiff_comm::ssh::mux::Connection;
///
/// # async fn example() -> skiff_platform::SkiffResult<()> {
/// // `stream` is an already-authenticated transport supplied by the caller
/// # let (stream, _peer) = tokio::io::duplex(4096);
/// let connection = Connection::new(stream);
///
/// let session = connection.open_session().await?;
/// # drop(session);
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    sender: SendHandle,
    channels: ChannelMap,
    next_channel_id: AtomicU32,
    reader_task: JoinHandle<()>,
}

impl Connection {
    /// Wraps an already-established, authenticated transport stream.
    ///
    /// Spawns the reader task that routes incoming channel messages; the
    /// task runs until the stream ends, a transport error occurs, or a
    /// DISCONNECT message arrives.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);

        let sender = SendHandle::new(Box::new(write_half));
        let channels: ChannelMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_channels = Arc::clone(&channels);
        let reader_task = tokio::spawn(async move {
            reader_loop(Box::new(read_half), reader_channels).await;
        });

        Self {
            sender,
            channels,
            next_channel_id: AtomicU32::new(0),
            reader_task,
        }
    }

    /// Opens a new session channel.
    ///
    /// Allocates a channel id, registers the session's message queue, sends
    /// CHANNEL_OPEN and waits for the remote side's confirmation. Safe to
    /// call from multiple tasks concurrently; every session is independent.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Protocol`] if the remote side refuses the
    /// channel or the connection ends before the reply arrives.
    pub async fn open_session(&self) -> SkiffResult<Session> {
        let local_id = self.next_channel_id.fetch_add(1, Ordering::SeqCst);

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.channels.lock().await.insert(local_id, tx);

        debug!("Opening session channel {}", local_id);

        let open = ChannelOpen::new(local_id, DEFAULT_WINDOW_SIZE, DEFAULT_MAX_PACKET_SIZE);
        if let Err(e) = self.sender.send(&open.to_bytes()).await {
            self.channels.lock().await.remove(&local_id);
            return Err(e);
        }

        match rx.recv().await {
            Some(ChannelMessage::OpenConfirmation {
                remote_id,
                initial_window_size,
                maximum_packet_size,
            }) => {
                debug!(
                    "Session channel {} confirmed (remote id {})",
                    local_id, remote_id
                );
                Ok(Session::new(
                    local_id,
                    remote_id,
                    initial_window_size,
                    maximum_packet_size,
                    self.sender.clone(),
                    rx,
                    Arc::clone(&self.channels),
                ))
            }
            Some(ChannelMessage::OpenFailure {
                reason,
                description,
            }) => {
                self.channels.lock().await.remove(&local_id);
                Err(SkiffError::Protocol(format!(
                    "Channel open refused: {} ({})",
                    description,
                    reason.as_str()
                )))
            }
            Some(other) => {
                self.channels.lock().await.remove(&local_id);
                Err(SkiffError::Protocol(format!(
                    "Unexpected reply to CHANNEL_OPEN: {:?}",
                    other
                )))
            }
            None => {
                self.channels.lock().await.remove(&local_id);
                Err(SkiffError::Protocol(
                    "Connection closed during channel open".to_string(),
                ))
            }
        }
    }

    /// Disconnects from the remote side.
    ///
    /// Sends SSH_MSG_DISCONNECT (by application) and shuts down the write
    /// half. In-flight sessions observe the loss through their queues.
    pub async fn close(&self) -> SkiffResult<()> {
        // byte DISCONNECT, uint32 reason code (11 = by application),
        // string description, string language tag
        let mut msg = vec![MessageType::Disconnect as u8];
        msg.extend_from_slice(&11u32.to_be_bytes());
        let description = b"disconnected by application";
        msg.extend_from_slice(&(description.len() as u32).to_be_bytes());
        msg.extend_from_slice(description);
        msg.extend_from_slice(&0u32.to_be_bytes());

        self.sender.send(&msg).await?;
        self.sender.shutdown().await?;

        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Reads packets from the transport and routes them until the stream ends.
async fn reader_loop(mut reader: Box<dyn AsyncRead + Send + Unpin>, channels: ChannelMap) {
    debug!("Connection reader started");

    loop {
        let payload = match read_packet(&mut reader).await {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Connection reader stopping: {}", e);
                break;
            }
        };

        if payload.is_empty() {
            continue;
        }

        match route_message(&channels, &payload).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!("Failed to route message: {}", e),
        }
    }

    // Dropping the senders tells every in-flight session the transport ended
    channels.lock().await.clear();

    debug!("Connection reader stopped");
}

/// Reads one binary packet and returns its payload.
async fn read_packet<R>(reader: &mut R) -> SkiffResult<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut length_bytes = [0u8; 4];
    reader.read_exact(&mut length_bytes).await?;
    let packet_length = u32::from_be_bytes(length_bytes) as usize;

    if packet_length + 4 > MAX_PACKET_SIZE {
        return Err(SkiffError::Protocol(format!(
            "Packet too large: {} bytes",
            packet_length
        )));
    }

    let mut packet_data = Vec::with_capacity(4 + packet_length);
    packet_data.extend_from_slice(&length_bytes);
    packet_data.resize(4 + packet_length, 0);
    reader.read_exact(&mut packet_data[4..]).await?;

    let packet = Packet::from_bytes(&packet_data)?;
    Ok(packet.payload().to_vec())
}

/// Routes one message payload. Returns `Ok(false)` when the peer
/// disconnected and the reader should stop.
async fn route_message(channels: &ChannelMap, payload: &[u8]) -> SkiffResult<bool> {
    match MessageType::from_u8(payload[0]) {
        Some(MessageType::ChannelOpenConfirmation) => {
            let msg = ChannelOpenConfirmation::from_bytes(payload)?;
            send_to_channel(
                channels,
                msg.recipient_channel(),
                ChannelMessage::OpenConfirmation {
                    remote_id: msg.sender_channel(),
                    initial_window_size: msg.initial_window_size(),
                    maximum_packet_size: msg.maximum_packet_size(),
                },
            )
            .await?;
        }

        Some(MessageType::ChannelOpenFailure) => {
            let msg = ChannelOpenFailure::from_bytes(payload)?;
            let reason = msg.reason_code();
            let description = msg.description().to_string();
            send_to_channel(
                channels,
                msg.recipient_channel(),
                ChannelMessage::OpenFailure {
                    reason,
                    description,
                },
            )
            .await?;
        }

        Some(MessageType::ChannelData) => {
            let msg = ChannelData::from_bytes(payload)?;
            let channel_id = msg.recipient_channel();
            send_to_channel(channels, channel_id, ChannelMessage::Data(msg.into_data())).await?;
        }

        Some(MessageType::ChannelExtendedData) => {
            let msg = ChannelExtendedData::from_bytes(payload)?;
            let channel_id = msg.recipient_channel();
            send_to_channel(
                channels,
                channel_id,
                ChannelMessage::ExtendedData(msg.into_data()),
            )
            .await?;
        }

        Some(MessageType::ChannelWindowAdjust) => {
            let msg = ChannelWindowAdjust::from_bytes(payload)?;
            send_to_channel(
                channels,
                msg.recipient_channel(),
                ChannelMessage::WindowAdjust(msg.bytes_to_add()),
            )
            .await?;
        }

        Some(MessageType::ChannelEof) => {
            let msg = crate::ssh::connection::ChannelEof::from_bytes(payload)?;
            send_to_channel(channels, msg.recipient_channel(), ChannelMessage::Eof).await?;
        }

        Some(MessageType::ChannelClose) => {
            let msg = crate::ssh::connection::ChannelClose::from_bytes(payload)?;
            send_to_channel(channels, msg.recipient_channel(), ChannelMessage::Close).await?;
        }

        Some(MessageType::ChannelSuccess) => {
            let msg = crate::ssh::connection::ChannelSuccess::from_bytes(payload)?;
            send_to_channel(channels, msg.recipient_channel(), ChannelMessage::Success).await?;
        }

        Some(MessageType::ChannelFailure) => {
            let msg = crate::ssh::connection::ChannelFailure::from_bytes(payload)?;
            send_to_channel(channels, msg.recipient_channel(), ChannelMessage::Failure).await?;
        }

        Some(MessageType::ChannelRequest) => {
            let msg = ChannelRequest::from_bytes(payload)?;
            let channel_id = msg.recipient_channel();
            match msg.into_request_type() {
                ChannelRequestType::ExitStatus { exit_status } => {
                    send_to_channel(channels, channel_id, ChannelMessage::ExitStatus(exit_status))
                        .await?;
                }
                ChannelRequestType::ExitSignal {
                    signal_name,
                    core_dumped,
                    ..
                } => {
                    send_to_channel(
                        channels,
                        channel_id,
                        ChannelMessage::ExitSignal {
                            signal_name,
                            core_dumped,
                        },
                    )
                    .await?;
                }
                other => {
                    debug!(
                        "Ignoring '{}' request from remote on channel {}",
                        other.name(),
                        channel_id
                    );
                }
            }
        }

        Some(MessageType::Ignore) | Some(MessageType::Debug) => {
            // Keep-alive padding and debug chatter carry no routing state
        }

        Some(MessageType::Disconnect) => {
            debug!("Remote side disconnected");
            return Ok(false);
        }

        Some(MessageType::ChannelOpen) => {
            // This side never accepts remotely-initiated channels
            warn!("Unexpected CHANNEL_OPEN from remote side");
        }

        None => {
            warn!("Unknown message type {}", payload[0]);
        }
    }

    Ok(true)
}

/// Delivers a message to a specific channel's queue.
async fn send_to_channel(
    channels: &ChannelMap,
    channel_id: u32,
    message: ChannelMessage,
) -> SkiffResult<()> {
    let channels = channels.lock().await;

    if let Some(tx) = channels.get(&channel_id) {
        tx.send(message).map_err(|_| {
            SkiffError::Protocol(format!("Channel {} receiver dropped", channel_id))
        })?;
    } else {
        warn!("Received message for unknown channel {}", channel_id);
    }

    Ok(())
}
