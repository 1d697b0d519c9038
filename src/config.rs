use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure that can be loaded from CLI, config file, or environment
///
/// Example configuration file content
/// # Live relay configuration
///
/// # Server configuration
/// control_port = 8501
/// upload_port = 8000
/// workspace = "./videos"
///
/// # Encoder configuration
/// ffmpeg = "/usr/local/bin/ffmpeg"
/// ingest_url = "rtmp://a.rtmp.youtube.com/live2"
/// stop_grace_ms = 1000
///
/// # Operator log
/// log_capacity = 200
/// log_display = 20
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Port of the control page
    #[arg(short = 'p', long, default_value_t = 8501)]
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// Port of the large-file upload page
    #[arg(short, long, default_value_t = 8000)]
    #[serde(default = "default_upload_port")]
    pub upload_port: u16,

    /// Working directory: uploaded files land here and videos are listed from here
    #[arg(short = 'w', long, default_value = ".")]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Encoder binary (name on PATH or absolute path)
    #[arg(long, default_value = "ffmpeg")]
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// RTMP ingest endpoint, the stream key is appended to it
    #[arg(long, default_value = "rtmp://a.rtmp.youtube.com/live2")]
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,

    /// Milliseconds to wait after a polite stop before force-killing the encoder
    #[arg(long, default_value_t = 1000)]
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Number of log lines retained in memory
    #[arg(long, default_value_t = 200)]
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Number of log lines shown on the control page
    #[arg(long, default_value_t = 20)]
    #[serde(default = "default_log_display")]
    pub log_display: usize,

    /// Configuration file path (overrides all other arguments)
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_port: default_control_port(),
            upload_port: default_upload_port(),
            workspace: default_workspace(),
            ffmpeg: default_ffmpeg(),
            ingest_url: default_ingest_url(),
            stop_grace_ms: default_stop_grace_ms(),
            log_capacity: default_log_capacity(),
            log_display: default_log_display(),
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.control_port == default_control_port() {
            self.control_port = file_config.control_port;
        }
        if self.upload_port == default_upload_port() {
            self.upload_port = file_config.upload_port;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.ffmpeg == default_ffmpeg() {
            self.ffmpeg = file_config.ffmpeg;
        }
        if self.ingest_url == default_ingest_url() {
            self.ingest_url = file_config.ingest_url;
        }
        if self.stop_grace_ms == default_stop_grace_ms() {
            self.stop_grace_ms = file_config.stop_grace_ms;
        }
        if self.log_capacity == default_log_capacity() {
            self.log_capacity = file_config.log_capacity;
        }
        if self.log_display == default_log_display() {
            self.log_display = file_config.log_display;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.control_port != 0 && self.control_port == self.upload_port {
            return Err(anyhow::anyhow!(
                "Control port and upload port must differ (both are {})",
                self.control_port
            ));
        }

        if self.ffmpeg.trim().is_empty() {
            return Err(anyhow::anyhow!("Encoder binary cannot be empty"));
        }

        if !self.ingest_url.starts_with("rtmp://") && !self.ingest_url.starts_with("rtmps://") {
            return Err(anyhow::anyhow!(
                "Ingest URL must start with rtmp:// or rtmps://"
            ));
        }

        if self.log_display == 0 {
            return Err(anyhow::anyhow!("log_display must be greater than 0"));
        }
        if self.log_capacity < self.log_display {
            return Err(anyhow::anyhow!(
                "log_capacity ({}) must be at least log_display ({})",
                self.log_capacity,
                self.log_display
            ));
        }

        Ok(())
    }

    pub fn workspace_path(&self) -> PathBuf {
        PathBuf::from(&self.workspace)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

// Default value functions
fn default_control_port() -> u16 {
    8501
}

fn default_upload_port() -> u16 {
    8000
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ingest_url() -> String {
    "rtmp://a.rtmp.youtube.com/live2".to_string()
}

fn default_stop_grace_ms() -> u64 {
    1000
}

fn default_log_capacity() -> usize {
    200
}

fn default_log_display() -> usize {
    20
}
