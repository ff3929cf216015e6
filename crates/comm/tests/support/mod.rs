//! Test support: a scripted remote peer speaking the wire protocol.
//!
//! Plays the remote side of a connection over an in-memory duplex stream:
//! confirms session channels, answers pty/exec requests, records
//! everything the communicator sends, and plays back per-command scripts
//! (output, exit status).

use skiff_comm::ssh::connection::{
    ChannelClose, ChannelData, ChannelEof, ChannelExtendedData, ChannelFailure, ChannelOpen,
    ChannelOpenConfirmation, ChannelOpenFailure, ChannelOpenFailureReason, ChannelRequest,
    ChannelRequestType, ChannelSuccess, ExtendedDataType,
};
use skiff_comm::ssh::message::MessageType;
use skiff_comm::ssh::packet::Packet;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// Script for one exec'd command.
#[derive(Debug, Clone)]
pub struct ExecScript {
    /// Bytes the remote process writes to stdout
    pub stdout: Vec<u8>,
    /// Bytes the remote process writes to stderr
    pub stderr: Vec<u8>,
    /// Exit status reported when the process finishes
    pub exit_status: u32,
    /// Consume stdin until EOF before finishing (sink-mode receivers)
    pub wait_for_eof: bool,
}

impl ExecScript {
    /// A process that exits immediately with the given status.
    pub fn exit(status: u32) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_status: status,
            wait_for_eof: false,
        }
    }

    /// A process that writes to stdout and exits 0.
    pub fn with_stdout(stdout: &[u8]) -> Self {
        Self {
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
            exit_status: 0,
            wait_for_eof: false,
        }
    }

    /// A sink-mode receiver: consumes stdin until EOF, then exits.
    pub fn sink(status: u32) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_status: status,
            wait_for_eof: true,
        }
    }
}

/// Everything the peer observed, for test assertions.
#[derive(Debug, Default)]
pub struct RemoteLog {
    /// Client channel ids of every session open, in arrival order
    pub opens: Vec<u32>,
    /// Commands exec'd, in arrival order
    pub execs: Vec<String>,
    /// Pty requests: (term, width, height, encoded modes)
    pub ptys: Vec<(String, u32, u32, Vec<u8>)>,
    /// Bytes written to each session's stdin, keyed by client channel id
    pub stdin: HashMap<u32, Vec<u8>>,
    /// Number of EOFs received per client channel id
    pub eofs: HashMap<u32, u32>,
}

/// Maps an exec'd command to its script.
pub type ScriptFn = Box<dyn Fn(&str) -> ExecScript + Send + 'static>;

/// Peer behavior switches.
pub struct FakeRemoteConfig {
    /// Refuse every CHANNEL_OPEN
    pub refuse_open: bool,
    /// Refuse every pty-req
    pub refuse_pty: bool,
    /// Refuse every exec
    pub refuse_exec: bool,
    /// Script selector for accepted execs
    pub script: ScriptFn,
}

impl Default for FakeRemoteConfig {
    fn default() -> Self {
        Self {
            refuse_open: false,
            refuse_pty: false,
            refuse_exec: false,
            script: Box::new(|_| ExecScript::exit(0)),
        }
    }
}

impl FakeRemoteConfig {
    /// Config with a script selector and default behavior otherwise.
    pub fn scripted(script: impl Fn(&str) -> ExecScript + Send + 'static) -> Self {
        Self {
            script: Box::new(script),
            ..Self::default()
        }
    }
}

/// State of one accepted channel on the peer side.
struct ChanState {
    client_id: u32,
    pending: Option<ExecScript>,
}

/// The scripted remote peer.
pub struct FakeRemote {
    log: Arc<Mutex<RemoteLog>>,
    _handle: JoinHandle<()>,
}

impl FakeRemote {
    /// Spawns the peer on its end of a duplex stream.
    pub fn spawn(stream: DuplexStream, config: FakeRemoteConfig) -> Self {
        let log = Arc::new(Mutex::new(RemoteLog::default()));
        let task_log = Arc::clone(&log);

        let handle = tokio::spawn(async move {
            run_peer(stream, config, task_log).await;
        });

        Self {
            log,
            _handle: handle,
        }
    }

    /// Returns the observation log.
    pub fn log(&self) -> Arc<Mutex<RemoteLog>> {
        Arc::clone(&self.log)
    }
}

async fn run_peer(stream: DuplexStream, config: FakeRemoteConfig, log: Arc<Mutex<RemoteLog>>) {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut states: HashMap<u32, ChanState> = HashMap::new();
    let mut next_server_id = 100u32;

    while let Some(payload) = read_frame(&mut reader).await {
        if payload.is_empty() {
            continue;
        }

        match MessageType::from_u8(payload[0]) {
            Some(MessageType::ChannelOpen) => {
                let open = ChannelOpen::from_bytes(&payload).unwrap();
                let client_id = open.sender_channel();
                log.lock().unwrap().opens.push(client_id);

                if config.refuse_open {
                    let failure = ChannelOpenFailure::new(
                        client_id,
                        ChannelOpenFailureReason::AdministrativelyProhibited,
                    );
                    send_frame(&mut writer, &failure.to_bytes()).await;
                } else {
                    let server_id = next_server_id;
                    next_server_id += 1;
                    states.insert(
                        server_id,
                        ChanState {
                            client_id,
                            pending: None,
                        },
                    );

                    let confirm =
                        ChannelOpenConfirmation::new(client_id, server_id, 1 << 21, 32768);
                    send_frame(&mut writer, &confirm.to_bytes()).await;
                }
            }

            Some(MessageType::ChannelRequest) => {
                let request = ChannelRequest::from_bytes(&payload).unwrap();
                let server_id = request.recipient_channel();
                let client_id = match states.get(&server_id) {
                    Some(state) => state.client_id,
                    None => continue,
                };

                match request.into_request_type() {
                    ChannelRequestType::PtyReq {
                        term,
                        width_chars,
                        height_rows,
                        modes,
                        ..
                    } => {
                        log.lock()
                            .unwrap()
                            .ptys
                            .push((term, width_chars, height_rows, modes));

                        if config.refuse_pty {
                            send_frame(&mut writer, &ChannelFailure::new(client_id).to_bytes())
                                .await;
                        } else {
                            send_frame(&mut writer, &ChannelSuccess::new(client_id).to_bytes())
                                .await;
                        }
                    }

                    ChannelRequestType::Exec { command } => {
                        log.lock().unwrap().execs.push(command.clone());

                        if config.refuse_exec {
                            send_frame(&mut writer, &ChannelFailure::new(client_id).to_bytes())
                                .await;
                        } else {
                            send_frame(&mut writer, &ChannelSuccess::new(client_id).to_bytes())
                                .await;

                            let script = (config.script)(&command);
                            if script.wait_for_eof {
                                if let Some(state) = states.get_mut(&server_id) {
                                    state.pending = Some(script);
                                }
                            } else {
                                play_script(&mut writer, client_id, &script).await;
                            }
                        }
                    }

                    _ => {
                        send_frame(&mut writer, &ChannelFailure::new(client_id).to_bytes()).await;
                    }
                }
            }

            Some(MessageType::ChannelData) => {
                let data = ChannelData::from_bytes(&payload).unwrap();
                if let Some(state) = states.get(&data.recipient_channel()) {
                    log.lock()
                        .unwrap()
                        .stdin
                        .entry(state.client_id)
                        .or_default()
                        .extend_from_slice(data.data());
                }
            }

            Some(MessageType::ChannelEof) => {
                let eof = ChannelEof::from_bytes(&payload).unwrap();
                if let Some(state) = states.get_mut(&eof.recipient_channel()) {
                    let client_id = state.client_id;
                    *log.lock().unwrap().eofs.entry(client_id).or_default() += 1;

                    if let Some(script) = state.pending.take() {
                        play_script(&mut writer, client_id, &script).await;
                    }
                }
            }

            Some(MessageType::ChannelClose) => {
                let close = ChannelClose::from_bytes(&payload).unwrap();
                states.remove(&close.recipient_channel());
            }

            Some(MessageType::Disconnect) => break,

            // Window adjusts and the rest carry no scripted behavior
            _ => {}
        }
    }
}

/// Plays a finished process: output, exit status, EOF, close.
async fn play_script(
    writer: &mut (impl AsyncWrite + Unpin),
    client_id: u32,
    script: &ExecScript,
) {
    if !script.stdout.is_empty() {
        let data = ChannelData::new(client_id, script.stdout.clone());
        send_frame(writer, &data.to_bytes()).await;
    }

    if !script.stderr.is_empty() {
        let data =
            ChannelExtendedData::new(client_id, ExtendedDataType::Stderr, script.stderr.clone());
        send_frame(writer, &data.to_bytes()).await;
    }

    let status = ChannelRequest::new(
        client_id,
        ChannelRequestType::ExitStatus {
            exit_status: script.exit_status,
        },
        false,
    );
    send_frame(writer, &status.to_bytes()).await;

    send_frame(writer, &ChannelEof::new(client_id).to_bytes()).await;
    send_frame(writer, &ChannelClose::new(client_id).to_bytes()).await;
}

/// Reads one framed payload; None when the stream ends.
async fn read_frame(reader: &mut (impl AsyncRead + Unpin)) -> Option<Vec<u8>> {
    let mut length_bytes = [0u8; 4];
    reader.read_exact(&mut length_bytes).await.ok()?;
    let packet_length = u32::from_be_bytes(length_bytes) as usize;

    let mut data = Vec::with_capacity(4 + packet_length);
    data.extend_from_slice(&length_bytes);
    data.resize(4 + packet_length, 0);
    reader.read_exact(&mut data[4..]).await.ok()?;

    Some(Packet::from_bytes(&data).unwrap().payload().to_vec())
}

/// Frames and writes one payload.
async fn send_frame(writer: &mut (impl AsyncWrite + Unpin), payload: &[u8]) {
    let bytes = Packet::new(payload.to_vec()).to_bytes();
    writer.write_all(&bytes).await.unwrap();
    writer.flush().await.unwrap();
}

/// Shared in-memory sink for capturing a command's output across tasks.
#[derive(Clone, Debug, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the captured bytes.
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
