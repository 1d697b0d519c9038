use super::{EncodeHandle, EncoderProfile, FallbackKiller, StopOutcome, StreamError, StreamRequest};
use crate::log_buffer::SharedLog;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReport {
    /// The tracked encoder was stopped.
    Stopped(StopOutcome),
    /// Nothing was tracked, kill-by-name was attempted instead.
    Fallback,
}

/// Owns the one encoder this process may run at a time.
///
/// A second `start` while an encoder is alive is rejected with
/// [`StreamError::AlreadyRunning`]; the caller has to stop first.
pub struct StreamController {
    profile: EncoderProfile,
    grace: Duration,
    log: SharedLog,
    killer: Arc<dyn FallbackKiller>,
    shutdown: CancellationToken,
    active: Option<EncodeHandle>,
}

impl StreamController {
    pub fn new(
        profile: EncoderProfile,
        grace: Duration,
        log: SharedLog,
        killer: Arc<dyn FallbackKiller>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            profile,
            grace,
            log,
            killer,
            shutdown,
            active: None,
        }
    }

    pub fn profile(&self) -> &EncoderProfile {
        &self.profile
    }

    /// Drops the tracked handle if its process has exited.
    async fn reap(&mut self) {
        let Some(handle) = self.active.as_mut() else {
            return;
        };

        match handle.try_status() {
            Ok(None) => {}
            Ok(Some(status)) => {
                let pid = handle.pid();
                info!(pid, %status, "Encoder exited");
                handle.finish_relay().await;
                self.active = None;
                self.log.push(format!("ffmpeg exited ({status}).")).await;
            }
            Err(error) => {
                warn!(pid = handle.pid(), ?error, "Failed to poll encoder, dropping handle");
                self.active = None;
            }
        }
    }

    pub async fn status(&mut self) -> StreamStatus {
        self.reap().await;
        StreamStatus {
            running: self.active.is_some(),
            pid: self.active.as_ref().map(EncodeHandle::pid),
        }
    }

    pub async fn start(&mut self, req: StreamRequest) -> Result<u32, StreamError> {
        req.validate()?;

        self.reap().await;
        if let Some(handle) = &self.active {
            warn!(pid = handle.pid(), "Start rejected, encoder already running");
            return Err(StreamError::AlreadyRunning(handle.pid()));
        }

        self.log
            .push(format!("Running ffmpeg: {}", self.profile.display(&req)))
            .await;

        let command = self.profile.command(&req);
        match EncodeHandle::spawn(command, self.log.clone(), &self.shutdown) {
            Ok(handle) => {
                let pid = handle.pid();
                info!(
                    pid,
                    source = %req.source.display(),
                    shorts = req.shorts,
                    loop_forever = req.loop_forever,
                    "Streaming started"
                );
                self.active = Some(handle);
                Ok(pid)
            }
            Err(error) => {
                error!(?error, program = %self.profile.program().display(), "Failed to spawn encoder");
                let error = StreamError::Spawn(error);
                self.log.push(error.to_string()).await;
                Err(error)
            }
        }
    }

    pub async fn stop(&mut self) -> Result<StopReport, StreamError> {
        self.reap().await;

        if let Some(handle) = self.active.take() {
            self.log.push("Stopping ffmpeg...").await;
            return match handle.stop(self.grace).await {
                Ok(outcome) => {
                    self.log.push("ffmpeg stopped.").await;
                    Ok(StopReport::Stopped(outcome))
                }
                Err(error) => {
                    error!(?error, "Failed to stop encoder");
                    let error = StreamError::Stop(error);
                    self.log.push(error.to_string()).await;
                    Err(error)
                }
            };
        }

        let name = self.profile.process_name();
        match self.killer.kill_by_name(&name) {
            Ok(()) => {
                self.log
                    .push(format!("Ran kill command for {name} (fallback)."))
                    .await;
                Ok(StopReport::Fallback)
            }
            Err(error) => {
                error!(?error, name, "Fallback kill failed");
                self.log.push(format!("Fallback kill failed: {error}")).await;
                Err(StreamError::Stop(error))
            }
        }
    }

    /// Stops the tracked encoder, if any, without the kill-by-name fallback.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.active.take() {
            let pid = handle.pid();
            info!(pid, "Stopping encoder on shutdown");
            if let Err(error) = handle.stop(self.grace).await {
                error!(pid, ?error, "Failed to stop encoder on shutdown");
            }
        }
    }
}
