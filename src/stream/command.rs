use super::StreamError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub const DEFAULT_INGEST_URL: &str = "rtmp://a.rtmp.youtube.com/live2";

/// Vertical output used for Shorts.
pub const SHORTS_SCALE: &str = "scale=720:1280";

// Fixed H.264/AAC live profile
const VIDEO_ARGS: [&str; 14] = [
    "-c:v",
    "libx264",
    "-preset",
    "veryfast",
    "-b:v",
    "2500k",
    "-maxrate",
    "2500k",
    "-bufsize",
    "5000k",
    "-g",
    "60",
    "-keyint_min",
    "60",
];
const AUDIO_ARGS: [&str; 4] = ["-c:a", "aac", "-b:a", "128k"];

/// What the operator asked to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub source: PathBuf,
    pub stream_key: String,
    pub shorts: bool,
    pub loop_forever: bool,
}

impl StreamRequest {
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.source.as_os_str().is_empty() {
            return Err(StreamError::MissingSource);
        }
        if self.stream_key.trim().is_empty() {
            return Err(StreamError::MissingStreamKey);
        }
        Ok(())
    }
}

/// Encoder binary and destination.
#[derive(Debug, Clone)]
pub struct EncoderProfile {
    pub program: PathBuf,
    pub ingest_url: String,
}

impl Default for EncoderProfile {
    fn default() -> Self {
        Self::new("ffmpeg", DEFAULT_INGEST_URL)
    }
}

impl EncoderProfile {
    /// Resolves `program` on `PATH` when possible, otherwise keeps it as given
    /// and lets spawning report the failure.
    pub fn new(program: &str, ingest_url: &str) -> Self {
        let program = which::which(program).unwrap_or_else(|_| PathBuf::from(program));
        Self {
            program,
            ingest_url: ingest_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    /// Name used when falling back to kill-by-name.
    pub fn process_name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ffmpeg".to_string())
    }

    pub fn output_url(&self, stream_key: &str) -> String {
        format!("{}/{}", self.ingest_url, stream_key.trim())
    }

    pub fn build_args(&self, req: &StreamRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-re".into()];
        if req.loop_forever {
            // must precede -i
            args.extend([OsString::from("-stream_loop"), OsString::from("-1")]);
        }
        args.push("-i".into());
        args.push(req.source.as_os_str().to_owned());
        args.extend(VIDEO_ARGS.into_iter().map(OsString::from));
        args.extend(AUDIO_ARGS.into_iter().map(OsString::from));
        if req.shorts {
            args.extend([OsString::from("-vf"), OsString::from(SHORTS_SCALE)]);
        }
        args.extend([OsString::from("-f"), OsString::from("flv")]);
        args.push(self.output_url(&req.stream_key).into());
        args
    }

    /// Command line for the operator log, with the stream key masked.
    pub fn display(&self, req: &StreamRequest) -> String {
        let mut args = self.build_args(req);
        // the output url is always last
        args.pop();

        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        parts.push(format!("{}/****", self.ingest_url));
        parts.join(" ")
    }

    pub fn command(&self, req: &StreamRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.build_args(req))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}
