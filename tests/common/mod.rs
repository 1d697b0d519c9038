#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use yt_live_relay::{AppState, Config, FallbackKiller};

/// Records kill-by-name requests instead of killing anything on the test machine.
#[derive(Default)]
pub struct RecordingKiller {
    calls: StdMutex<Vec<String>>,
}

impl RecordingKiller {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl FallbackKiller for RecordingKiller {
    fn kill_by_name(&self, name: &str) -> std::io::Result<()> {
        self.calls.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Test harness that manages both servers
pub struct TestServer {
    handle: JoinHandle<anyhow::Result<()>>,
    shutdown: CancellationToken,
    c_port: u16,
    u_port: u16,
    workspace: PathBuf,
    pub killer: Arc<RecordingKiller>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start the servers, letting the caller adjust the config first
    pub async fn start_with(adjust: impl FnOnce(&mut Config)) -> Self {
        // Only open when debugging
        // tracing_subscriber::fmt::init();

        let c_port = portpicker::pick_unused_port().expect("No available port");
        let u_port = portpicker::pick_unused_port().expect("No available port");

        let test_id = uuid::Uuid::new_v4().to_string();
        let workspace = PathBuf::from(format!("/tmp/test-workspace-{test_id}"));

        let mut config = Config {
            control_port: c_port,
            upload_port: u_port,
            workspace: workspace.to_string_lossy().into_owned(),
            stop_grace_ms: 500,
            ..Default::default()
        };
        adjust(&mut config);

        let shutdown = CancellationToken::new();
        let killer = Arc::new(RecordingKiller::default());
        let state = AppState::with_killer(&config, shutdown.clone(), killer.clone())
            .await
            .expect("Failed to create app state");

        let handle = tokio::spawn(async move { yt_live_relay::serve(&config, state).await });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        // The upload listener is bound before the control server starts, so
        // a ready control page means both are up (or the upload one failed)
        for _ in 0..100 {
            let control = client
                .get(format!("http://127.0.0.1:{c_port}/status"))
                .send()
                .await;
            if let Ok(c) = control
                && c.status().is_success()
            {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }

        TestServer {
            handle,
            shutdown,
            c_port,
            u_port,
            workspace,
            killer,
            client,
        }
    }

    pub fn control_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.c_port)
    }

    pub fn upload_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.u_port)
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Upload `data` as the `file` field under `name`
    pub async fn upload(&self, name: &str, data: Vec<u8>) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data).file_name(name.to_string());
        // send the name verbatim, like a browser would
        let form = reqwest::multipart::Form::new()
            .percent_encode_noop()
            .part("file", part);
        self.client
            .post(self.upload_url("/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.control_url(path))
            .form(fields)
            .send()
            .await
            .unwrap()
    }

    /// Post the control form as multipart, the way the browser sends it
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> reqwest::Response {
        self.client
            .post(self.control_url(path))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn status(&self) -> serde_json::Value {
        let body = self
            .client
            .get(self.control_url("/status"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        serde_json::from_str(&body).unwrap()
    }

    pub async fn logs(&self) -> String {
        self.client
            .get(self.control_url("/logs"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    /// Stops the servers and waits for the tracked encoder to be shut down
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(10), &mut self.handle).await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();

        // Clean up test workspace
        std::fs::remove_dir_all(&self.workspace).ok();
    }
}
