//! Remote-execution communicator.
//!
//! Drives two protocols end-to-end over a caller-owned [`Connection`]:
//! an interactive remote session (pty negotiation, command start,
//! asynchronous exit reporting) and the legacy remote-copy sink
//! sub-protocol for single-file uploads. Every public operation opens its
//! own session and closes it on every exit path; the connection itself is
//! the only state shared between operations.
//!
//! # Example
//!
//! ```rust,no_run
//! use skiff_comm::ssh::command::RemoteCommand;
//! use skiff_comm::ssh::communicator::Communicator;
//! use skiff_comm::ssh::mux::Connection;
//! use std::sync::Arc;
//!
//! # async fn example() -> skiff_platform::SkiffResult<()> {
//! // `stream` is an already-authenticated transport supplied by the caller
//! # let (stream, _peer) = tokio::io::duplex(4096);
//! let connection = Arc::new(Connection::new(stream));
//! let comm = Communicator::new(connection);
//!
//! let mut cmd = RemoteCommand::new("echo ok");
//! cmd.set_stdout(Vec::new());
//! comm.start(&mut cmd).await?;
//!
//! let status = cmd.wait_exited().await?;
//! assert_eq!(status, 0);
//! # Ok(())
//! # }
//! ```

use crate::ssh::command::{CommandOutput, RemoteCommand};
use crate::ssh::mux::{ChannelMessage, Connection};
use crate::ssh::pty::{TerminalModes, ECHO, TTY_OP_ISPEED, TTY_OP_OSPEED};
use crate::ssh::scp;
use crate::ssh::session::{Session, StdinPipe};
use skiff_platform::{SkiffError, SkiffResult};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Communicator configuration.
#[derive(Debug, Clone)]
pub struct CommunicatorConfig {
    /// Terminal type requested for command sessions.
    pub term: String,
    /// Terminal width in characters.
    pub width_chars: u32,
    /// Terminal height in rows.
    pub height_rows: u32,
    /// Terminal input baud rate.
    ///
    /// The mode encoding requires an explicit value; the particular rate is
    /// not significant.
    pub input_speed: u32,
    /// Terminal output baud rate.
    pub output_speed: u32,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            width_chars: 80,
            height_rows: 40,
            input_speed: 14400,
            output_speed: 14400,
        }
    }
}

/// Runs commands and uploads files on a remote host over an established
/// connection.
///
/// The connection handle is caller-owned and outlives any single operation;
/// each operation opens one session and closes it when done.
pub struct Communicator {
    connection: Arc<Connection>,
    config: CommunicatorConfig,
}

impl Communicator {
    /// Creates a communicator with the default configuration.
    pub fn new(connection: Arc<Connection>) -> Self {
        Self::with_config(connection, CommunicatorConfig::default())
    }

    /// Creates a communicator with a custom configuration.
    pub fn with_config(connection: Arc<Connection>, config: CommunicatorConfig) -> Self {
        Self { connection, config }
    }

    /// Starts a remote command.
    ///
    /// Opens a session, binds the command's streams, negotiates a
    /// pseudo-terminal (local echo disabled, fixed input/output speeds) and
    /// starts execution. Returns once the remote side has accepted the
    /// command; completion is tracked by a background task that publishes
    /// the exit status on the command object exactly once.
    ///
    /// A non-zero exit or a failure during remote execution is never an
    /// error of this call; it is recorded in the command's exit state for
    /// the caller to inspect.
    ///
    /// # Errors
    ///
    /// Session creation, pty negotiation, and exec failures are returned
    /// synchronously; in that case the operation never started and no
    /// background task exists.
    pub async fn start(&self, cmd: &mut RemoteCommand) -> SkiffResult<()> {
        if cmd.command().is_empty() {
            return Err(SkiffError::Protocol(
                "Command must not be empty".to_string(),
            ));
        }
        if cmd.started() {
            return Err(SkiffError::Protocol(
                "Command has already been started".to_string(),
            ));
        }

        let mut session = self.connection.open_session().await?;

        let mut modes = TerminalModes::new();
        modes.set(ECHO, 0);
        modes.set(TTY_OP_ISPEED, self.config.input_speed);
        modes.set(TTY_OP_OSPEED, self.config.output_speed);

        if let Err(e) = session
            .request_pty(
                &self.config.term,
                self.config.width_chars,
                self.config.height_rows,
                &modes,
            )
            .await
        {
            let _ = session.close().await;
            return Err(e);
        }

        info!("Starting remote command: {}", cmd.command());

        // The remote shell needs an explicit line terminator
        if let Err(e) = session.exec(&format!("{}\n", cmd.command())).await {
            let _ = session.close().await;
            return Err(e);
        }

        let exit_tx = match cmd.take_exit_sender() {
            Some(exit_tx) => exit_tx,
            None => {
                let _ = session.close().await;
                return Err(SkiffError::Protocol(
                    "Command has already been started".to_string(),
                ));
            }
        };

        if let Some(stdin) = cmd.take_stdin() {
            let pipe = session.stdin_pipe();
            tokio::spawn(pump_stdin(pipe, stdin));
        }

        let stdout = cmd.take_stdout();
        let stderr = cmd.take_stderr();

        tokio::spawn(async move {
            let status = match run_command_session(&mut session, stdout, stderr).await {
                Ok(()) => 0,
                Err(SkiffError::Exit { status }) => status,
                Err(e) => {
                    debug!("Remote command finished without a clean exit: {}", e);
                    0
                }
            };

            let _ = session.close().await;

            // Publishing the status also flips the exited flag; the send
            // happens exactly once per command
            let _ = exit_tx.send(Some(status));
        });

        Ok(())
    }

    /// Uploads a file to the remote host.
    ///
    /// The entire source is buffered in memory before any byte is sent,
    /// because the sink protocol's control line must declare the exact
    /// length up front. On success the remote file contains exactly the
    /// source bytes, mode 0644.
    ///
    /// # Errors
    ///
    /// Setup failures return immediately. A non-zero exit from the remote
    /// receiver is returned as [`SkiffError::Exit`] with the receiver's
    /// status.
    pub async fn upload<R>(&self, remote_path: &str, source: R) -> SkiffResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let (target_dir, target_file) = scp::split_remote_path(remote_path);
        if target_file.is_empty() {
            return Err(SkiffError::Protocol(format!(
                "Remote path '{}' has no file name",
                remote_path
            )));
        }

        debug!("Opening session for upload to {}", remote_path);
        let mut session = self.connection.open_session().await?;

        let result = upload_on_session(&mut session, &target_dir, &target_file, source).await;
        let close_result = session.close().await;

        result.and(close_result)
    }

    /// Downloads a file from the remote host.
    ///
    /// Not implemented. This operation is intentionally a hard failure:
    /// calling it terminates the calling task rather than returning an
    /// error value that could be ignored.
    ///
    /// # Panics
    ///
    /// Always panics, regardless of arguments.
    pub async fn download<W>(&self, _remote_path: &str, _destination: W) -> SkiffResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        unimplemented!("remote file download is not supported by this communicator")
    }
}

/// Copies the caller's stdin stream into the session until EOF.
async fn pump_stdin(mut pipe: StdinPipe, mut stdin: Box<dyn AsyncRead + Send + Unpin>) {
    let mut buf = vec![0u8; 32 * 1024];

    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = pipe.write_all(&buf[..n]).await {
                    debug!("Stdin pump stopping: {}", e);
                    return;
                }
            }
            Err(e) => {
                debug!("Stdin read failed: {}", e);
                break;
            }
        }
    }

    if let Err(e) = pipe.close().await {
        debug!("Stdin close failed: {}", e);
    }
}

/// Streams session output into the command's sinks until the remote
/// command terminates.
///
/// Returns `Ok(())` for a zero exit, [`SkiffError::Exit`] for a reported
/// non-zero status, and a protocol error for any other termination.
async fn run_command_session(
    session: &mut Session,
    mut stdout: Option<CommandOutput>,
    mut stderr: Option<CommandOutput>,
) -> SkiffResult<()> {
    let mut exit_status: Option<u32> = None;
    let mut exit_signal: Option<String> = None;

    loop {
        match session.recv().await {
            Ok(ChannelMessage::Data(data)) => {
                if let Some(out) = stdout.as_mut() {
                    out.write_all(&data).await?;
                }
            }
            Ok(ChannelMessage::ExtendedData(data)) => {
                if let Some(err) = stderr.as_mut() {
                    err.write_all(&data).await?;
                }
            }
            Ok(ChannelMessage::ExitStatus(status)) => exit_status = Some(status),
            Ok(ChannelMessage::ExitSignal { signal_name, .. }) => {
                exit_signal = Some(signal_name)
            }
            Ok(ChannelMessage::Eof) => continue,
            Ok(ChannelMessage::Close) => break,
            Ok(_) => continue,
            Err(e) => {
                // A transport teardown right after the status report still
                // counts as completion
                if exit_status.is_some() || exit_signal.is_some() {
                    break;
                }
                return Err(e);
            }
        }
    }

    if let Some(out) = stdout.as_mut() {
        out.flush().await?;
    }
    if let Some(err) = stderr.as_mut() {
        err.flush().await?;
    }

    resolve_exit(exit_status, exit_signal)
}

/// Drives the sink protocol on an open session.
async fn upload_on_session<R>(
    session: &mut Session,
    target_dir: &str,
    target_file: &str,
    mut source: R,
) -> SkiffResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut pipe = session.stdin_pipe();

    info!("Starting remote receiver in sink mode for {}", target_dir);
    session.exec(&scp::sink_command(target_dir)).await?;

    // The control line declares the exact byte length before the body, so
    // the whole source is read up front; uploads must fit in memory.
    let mut payload = Vec::new();
    source.read_to_end(&mut payload).await?;

    debug!("Beginning file upload ({} bytes)", payload.len());
    let header = scp::control_line(payload.len(), target_file);
    pipe.write_all(header.as_bytes()).await?;
    pipe.write_all(&payload).await?;
    pipe.write_all(&[scp::SINK_EOF]).await?;

    // Closing sends EOF to the receiver. The pipe is consumed here, so no
    // cleanup path can close it a second time.
    debug!("Upload complete, closing stdin pipe");
    pipe.close().await?;

    // Wait for the receiver to consume everything and exit. Its per-phase
    // status bytes are not read back; stdout/stderr are captured only for
    // diagnostics.
    debug!("Waiting for remote receiver to finish");
    let mut receiver_stdout = Vec::new();
    let mut receiver_stderr = Vec::new();
    let mut exit_status: Option<u32> = None;
    let mut exit_signal: Option<String> = None;

    loop {
        match session.recv().await {
            Ok(ChannelMessage::Data(data)) => receiver_stdout.extend_from_slice(&data),
            Ok(ChannelMessage::ExtendedData(data)) => receiver_stderr.extend_from_slice(&data),
            Ok(ChannelMessage::ExitStatus(status)) => exit_status = Some(status),
            Ok(ChannelMessage::ExitSignal { signal_name, .. }) => {
                exit_signal = Some(signal_name)
            }
            Ok(ChannelMessage::Eof) => continue,
            Ok(ChannelMessage::Close) => break,
            Ok(_) => continue,
            Err(e) => {
                if exit_status.is_some() || exit_signal.is_some() {
                    break;
                }
                return Err(e);
            }
        }
    }

    debug!(
        "Receiver stdout ({} bytes): {:?}",
        receiver_stdout.len(),
        String::from_utf8_lossy(&receiver_stdout)
    );
    debug!(
        "Receiver stderr ({} bytes): {}",
        receiver_stderr.len(),
        String::from_utf8_lossy(&receiver_stderr)
    );

    let outcome = resolve_exit(exit_status, exit_signal);
    if let Err(SkiffError::Exit { status }) = &outcome {
        warn!(
            "Remote receiver exited with status {}: {}",
            status,
            String::from_utf8_lossy(&receiver_stderr)
        );
    }

    outcome
}

/// Maps a session's termination report onto the operation outcome.
fn resolve_exit(exit_status: Option<u32>, exit_signal: Option<String>) -> SkiffResult<()> {
    match (exit_status, exit_signal) {
        (Some(0), _) => Ok(()),
        (Some(status), _) => Err(SkiffError::Exit { status }),
        (None, Some(signal)) => Err(SkiffError::Protocol(format!(
            "Remote process terminated by signal {}",
            signal
        ))),
        (None, None) => Err(SkiffError::Protocol(
            "Session closed without an exit status".to_string(),
        )),
    }
}
