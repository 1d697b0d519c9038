use crate::log_buffer::SharedLog;
use crate::stream::{EncoderProfile, FallbackKiller, StreamController, SystemKiller};
use crate::{Config, net};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<TokioMutex<StreamController>>,
    pub log: SharedLog,
    pub log_display: usize,
    pub upload_url: String,
    pub shutdown: CancellationToken,

    workspace: PathBuf,
    upload_online: Arc<AtomicBool>,
}

impl AppState {
    pub async fn new(config: &Config, shutdown: CancellationToken) -> anyhow::Result<Self> {
        Self::with_killer(config, shutdown, Arc::new(SystemKiller::default())).await
    }

    pub async fn with_killer(
        config: &Config,
        shutdown: CancellationToken,
        killer: Arc<dyn FallbackKiller>,
    ) -> anyhow::Result<Self> {
        let workspace = config.workspace_path();
        tokio::fs::create_dir_all(&workspace).await?;
        let workspace = tokio::fs::canonicalize(&workspace).await?;

        let log = SharedLog::new(config.log_capacity);
        let profile = EncoderProfile::new(&config.ffmpeg, &config.ingest_url);
        info!(
            program = %profile.program().display(),
            ingest = %profile.ingest_url,
            workspace = %workspace.display(),
            "Encoder profile ready"
        );

        let controller = StreamController::new(
            profile,
            config.stop_grace(),
            log.clone(),
            killer,
            shutdown.clone(),
        );

        Ok(Self {
            controller: Arc::new(TokioMutex::new(controller)),
            log,
            log_display: config.log_display,
            upload_url: net::upload_url(config.upload_port),
            shutdown,
            workspace,
            upload_online: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Upload target and video listing directory.
    pub fn workspace(&self) -> &Path {
        self.workspace.as_path()
    }

    /// Link to the upload page, or `None` while that server is down.
    pub fn upload_link(&self) -> Option<&str> {
        self.upload_online
            .load(Ordering::Acquire)
            .then_some(self.upload_url.as_str())
    }

    pub(crate) fn set_upload_online(&self, online: bool) {
        self.upload_online.store(online, Ordering::Release);
    }
}
