use std::path::{Path, PathBuf};
use tracing::warn;

pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "flv", "mkv", "mov"];

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Names of the video files directly inside `dir`, sorted.
pub async fn list_videos(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut videos = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_video(&path) {
            continue;
        }
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => {
                videos.push(entry.file_name().to_string_lossy().into_owned());
            }
            Ok(_) => {}
            Err(error) => warn!(?error, path = %path.display(), "Failed to stat entry"),
        }
    }
    videos.sort();
    Ok(videos)
}

/// Where the stream source comes from and whether the operator should be
/// warned about the manual path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceChoice {
    pub path: Option<PathBuf>,
    pub warning: Option<&'static str>,
}

/// A listed file picked from `dir` is the default; a manual path replaces it
/// when it exists on this machine.
pub async fn resolve_source(dir: &Path, selected: &str, manual_path: &str) -> SourceChoice {
    let mut choice = SourceChoice::default();

    let selected = selected.trim();
    if !selected.is_empty() {
        // only bare names from the listing are accepted
        let name = Path::new(selected);
        if name.file_name() == Some(name.as_os_str()) {
            choice.path = Some(std::path::absolute(dir.join(name)).unwrap_or_else(|_| dir.join(name)));
        }
    }

    let manual_path = manual_path.trim();
    if !manual_path.is_empty() {
        if tokio::fs::try_exists(manual_path).await.unwrap_or(false) {
            choice.path = Some(PathBuf::from(manual_path));
        } else {
            choice.warning = Some("Local path not found on server.");
        }
    }

    choice
}
