//! Remote command state.
//!
//! A [`RemoteCommand`] carries the command text, the three byte streams the
//! executor binds to the remote process, and the command's completion
//! state. Completion is published exactly once through a watch channel: the
//! background task that observes the remote exit sends the status, and the
//! send is the synchronization point callers rely on — `exited()` can only
//! become true after the status is in place.

use skiff_platform::{SkiffError, SkiffResult};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

/// A reader bound to the remote process's stdin.
pub type CommandInput = Box<dyn AsyncRead + Send + Unpin>;

/// A writer bound to the remote process's stdout or stderr.
pub type CommandOutput = Box<dyn AsyncWrite + Send + Unpin>;

/// A shell command to run remotely, with its bound streams and completion
/// state.
///
/// # Example
///
/// ```rust
/// use skiff_comm::ssh::command::RemoteCommand;
///
/// let mut cmd = RemoteCommand::new("echo ok");
/// cmd.set_stdout(Vec::new());
/// assert!(!cmd.exited());
/// ```
pub struct RemoteCommand {
    /// Command text (without trailing newline)
    command: String,
    /// Stream fed to the remote process's stdin
    stdin: Option<CommandInput>,
    /// Stream receiving the remote process's stdout
    stdout: Option<CommandOutput>,
    /// Stream receiving the remote process's stderr
    stderr: Option<CommandOutput>,
    /// Taken by the executor when the command starts; publishes the status
    exit_tx: Option<watch::Sender<Option<u32>>>,
    /// Observes the published status
    exit_rx: watch::Receiver<Option<u32>>,
}

impl RemoteCommand {
    /// Creates a command with no streams bound.
    pub fn new(command: impl Into<String>) -> Self {
        let (exit_tx, exit_rx) = watch::channel(None);

        Self {
            command: command.into(),
            stdin: None,
            stdout: None,
            stderr: None,
            exit_tx: Some(exit_tx),
            exit_rx,
        }
    }

    /// Returns the command text.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Binds a stream to the remote process's stdin.
    pub fn set_stdin(&mut self, stdin: impl AsyncRead + Send + Unpin + 'static) {
        self.stdin = Some(Box::new(stdin));
    }

    /// Binds a stream to the remote process's stdout.
    pub fn set_stdout(&mut self, stdout: impl AsyncWrite + Send + Unpin + 'static) {
        self.stdout = Some(Box::new(stdout));
    }

    /// Binds a stream to the remote process's stderr.
    pub fn set_stderr(&mut self, stderr: impl AsyncWrite + Send + Unpin + 'static) {
        self.stderr = Some(Box::new(stderr));
    }

    /// Returns whether the remote command has exited.
    ///
    /// Transitions to true exactly once, after the exit status has been
    /// published.
    pub fn exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Returns the exit status.
    ///
    /// Meaningful only after [`exited`](Self::exited) returns true; before
    /// that it reads 0.
    pub fn exit_status(&self) -> u32 {
        (*self.exit_rx.borrow()).unwrap_or(0)
    }

    /// Waits until the remote command has exited and returns its status.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Protocol`] if the monitoring task went away
    /// without publishing a status.
    pub async fn wait_exited(&self) -> SkiffResult<u32> {
        let mut rx = self.exit_rx.clone();

        loop {
            if let Some(status) = *rx.borrow_and_update() {
                return Ok(status);
            }

            rx.changed().await.map_err(|_| {
                SkiffError::Protocol("Command monitor terminated without a status".to_string())
            })?;
        }
    }

    /// Returns whether the command has already been handed to an executor.
    pub(crate) fn started(&self) -> bool {
        self.exit_tx.is_none()
    }

    pub(crate) fn take_stdin(&mut self) -> Option<CommandInput> {
        self.stdin.take()
    }

    pub(crate) fn take_stdout(&mut self) -> Option<CommandOutput> {
        self.stdout.take()
    }

    pub(crate) fn take_stderr(&mut self) -> Option<CommandOutput> {
        self.stderr.take()
    }

    pub(crate) fn take_exit_sender(&mut self) -> Option<watch::Sender<Option<u32>>> {
        self.exit_tx.take()
    }
}

// Manual Debug implementation because the bound streams are not Debug
impl fmt::Debug for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCommand")
            .field("command", &self.command)
            .field("stdin", &self.stdin.as_ref().map(|_| "<stream>"))
            .field("stdout", &self.stdout.as_ref().map(|_| "<stream>"))
            .field("stderr", &self.stderr.as_ref().map(|_| "<stream>"))
            .field("exited", &self.exited())
            .field("exit_status", &self.exit_status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_command_state() {
        let cmd = RemoteCommand::new("echo ok");

        assert_eq!(cmd.command(), "echo ok");
        assert!(!cmd.exited());
        assert_eq!(cmd.exit_status(), 0);
        assert!(!cmd.started());
    }

    #[test]
    fn test_status_published_once() {
        let mut cmd = RemoteCommand::new("exit 7");

        let tx = cmd.take_exit_sender().unwrap();
        assert!(cmd.started());
        assert!(cmd.take_exit_sender().is_none());

        assert!(!cmd.exited());
        tx.send(Some(7)).unwrap();

        assert!(cmd.exited());
        assert_eq!(cmd.exit_status(), 7);
    }

    #[tokio::test]
    async fn test_wait_exited_resolves() {
        let mut cmd = RemoteCommand::new("sleep 1");
        let tx = cmd.take_exit_sender().unwrap();

        let waiter = tokio::spawn({
            let rx = cmd.exit_rx.clone();
            async move {
                let mut rx = rx;
                loop {
                    if let Some(status) = *rx.borrow_and_update() {
                        return status;
                    }
                    rx.changed().await.unwrap();
                }
            }
        });

        tx.send(Some(0)).unwrap();
        assert_eq!(waiter.await.unwrap(), 0);

        assert_eq!(cmd.wait_exited().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wait_exited_after_monitor_vanishes() {
        let mut cmd = RemoteCommand::new("true");
        let tx = cmd.take_exit_sender().unwrap();
        drop(tx);

        let result = cmd.wait_exited().await;
        assert!(result.is_err());
    }

    #[test]
    fn test_streams_taken_once() {
        let mut cmd = RemoteCommand::new("cat");
        cmd.set_stdin(std::io::Cursor::new(b"input".to_vec()));
        cmd.set_stdout(Vec::new());
        cmd.set_stderr(Vec::new());

        assert!(cmd.take_stdin().is_some());
        assert!(cmd.take_stdin().is_none());
        assert!(cmd.take_stdout().is_some());
        assert!(cmd.take_stderr().is_some());
    }

    #[test]
    fn test_debug_does_not_require_stream_debug() {
        let cmd = RemoteCommand::new("uname -a");
        let rendered = format!("{:?}", cmd);
        assert!(rendered.contains("uname -a"));
    }
}
