use std::io::{ErrorKind, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use scorelog_frame::ScoreEvent;
use tracing::{trace, warn};

use crate::config::RelayConfig;
use crate::handler::{HandlerError, ScoreHandler};

const WAIT_STEP: Duration = Duration::from_millis(10);

/// Runs a shell command once per event.
///
/// The event is written to the command's stdin as a single JSON line. A
/// command that fails to spawn or exits unsuccessfully is reported as a
/// handler failure.
///
/// Dispatch is synchronous: the relay loop does not read the next frame or
/// re-check its shutdown flag until the command exits. Without
/// [`CommandHandler::with_timeout`] a command that never exits stalls the
/// worker. With a timeout the command is killed once it elapses and the
/// invocation fails with [`HandlerError::TimedOut`].
#[derive(Debug, Clone)]
pub struct CommandHandler {
    name: String,
    command: String,
    timeout: Option<Duration>,
}

impl CommandHandler {
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            name: format!("cmd:{command}"),
            command,
            timeout: None,
        }
    }

    /// Kill the command if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The shell command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, HandlerError> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(command = %self.command, ?limit, "killing handler command");
                let _ = child.kill();
                let _ = child.wait();
                return Err(HandlerError::TimedOut(limit));
            }
            thread::sleep(WAIT_STEP.min(limit));
        }
    }
}

impl ScoreHandler for CommandHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, event: &ScoreEvent, config: &RelayConfig) -> Result<(), HandlerError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("SCORELOG_WORKER", &config.worker_name)
            .stdin(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&line) {
                Ok(()) => {}
                // The command may exit without reading its input.
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {}
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(err.into());
                }
            }
        }

        let status = self.wait(&mut child)?;
        trace!(command = %self.command, %status, "handler command finished");
        if status.success() {
            Ok(())
        } else {
            Err(HandlerError::ExitStatus(status))
        }
    }
}
