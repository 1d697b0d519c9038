use super::output::OutputLineCodec;
use crate::log_buffer::SharedLog;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::io::ErrorKind as StdIoErrorKind;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle as TokioJoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long the relay may keep draining output after the child is gone.
const RELAY_DRAIN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited on its own after the polite signal.
    Exited(ExitStatus),
    /// Still alive after the grace period and force-killed.
    Killed,
}

/// A running encoder child plus the task relaying its output to the log.
#[derive(Debug)]
pub struct EncodeHandle {
    child: Child,
    pid: u32,
    relay: TokioJoinHandle<()>,
    cancel: CancellationToken,
}

impl EncodeHandle {
    /// Spawns `command` (stdout and stderr must be piped) and starts relaying
    /// both streams to `log`. The relay stops when `shutdown` is cancelled.
    pub fn spawn(
        mut command: Command,
        log: SharedLog,
        shutdown: &CancellationToken,
    ) -> std::io::Result<Self> {
        let mut child = command.spawn()?;
        let pid = child.id().unwrap_or_default();

        let mut streams: Vec<BoxStream<'static, std::io::Result<String>>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            streams.push(line_stream(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            streams.push(line_stream(stderr));
        }

        let cancel = shutdown.child_token();
        let relay = tokio::spawn(relay_output(streams, log, cancel.clone()));
        info!(pid, "Encoder started");

        Ok(Self {
            child,
            pid,
            relay,
            cancel,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking liveness check; reaps the child when it has exited.
    pub fn try_status(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.try_status(), Ok(None))
    }

    /// Polite stop, then a forced kill once `grace` has elapsed.
    pub async fn stop(mut self, grace: Duration) -> std::io::Result<StopOutcome> {
        let pid = self.pid;
        self.terminate()?;

        let outcome = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => StopOutcome::Exited(status?),
            Err(_) => {
                warn!(pid, ?grace, "Encoder ignored termination, killing");
                self.child.kill().await?;
                StopOutcome::Killed
            }
        };

        self.finish_relay().await;
        info!(pid, ?outcome, "Encoder stopped");
        Ok(outcome)
    }

    /// Lets the relay flush what is left, then cancels it.
    pub async fn finish_relay(&mut self) {
        if tokio::time::timeout(RELAY_DRAIN, &mut self.relay)
            .await
            .is_err()
        {
            debug!(pid = self.pid, "Output relay still busy, cancelling");
            self.cancel.cancel();
            _ = (&mut self.relay).await;
        }
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> std::io::Result<()> {
        if self.child.id().is_none() {
            // already reaped
            return Ok(());
        }
        let pid = libc::pid_t::try_from(self.pid)
            .map_err(|error| std::io::Error::new(StdIoErrorKind::InvalidInput, error))?;

        // SAFETY: the child has not been reaped, so the pid still refers to it.
        let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
        if ret == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> std::io::Result<()> {
        match self.child.start_kill() {
            Err(error) if error.kind() == StdIoErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}

impl Drop for EncodeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn line_stream<R>(reader: R) -> BoxStream<'static, std::io::Result<String>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    FramedRead::new(reader, OutputLineCodec).boxed()
}

async fn relay_output(
    streams: Vec<BoxStream<'static, std::io::Result<String>>>,
    log: SharedLog,
    cancel: CancellationToken,
) {
    let mut lines = futures::stream::select_all(streams);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Output relay cancelled");
                break;
            }
            next = lines.next() => match next {
                Some(Ok(line)) => log.push(line).await,
                Some(Err(error)) => {
                    log.push(format!("[ffmpeg read error] {error}")).await;
                    break;
                }
                None => {
                    debug!("Encoder output closed");
                    break;
                }
            }
        }
    }
}
