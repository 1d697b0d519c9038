use crate::AppState;
use crate::api::page::{ControlView, Notice, render_control_page};
use crate::api::upload::{sanitize_upload_name, store_field};
use crate::media::{list_videos, resolve_source};
use crate::stream::{StopReport, StreamError, StreamRequest, StreamStatus};
use axum::extract::multipart::MultipartError;
use axum::extract::{Extension, Form, FromRequest, Multipart, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Json, Response};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// File input of the control form.
const UPLOAD_FIELD: &str = "upload";

/// Fields posted by the control form. Checkboxes are only present when ticked.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartForm {
    pub selected: String,
    pub path: String,
    pub stream_key: String,
    pub shorts: Option<String>,
    pub loop_video: Option<String>,
}

impl StartForm {
    fn shorts(&self) -> bool {
        self.shorts.is_some()
    }

    fn loop_video(&self) -> bool {
        self.loop_video.is_some()
    }
}

/// Video attached to the control form.
enum AttachedVideo {
    Saved(PathBuf),
    InvalidName,
    Failed(std::io::Error),
}

fn multipart_error(error: MultipartError) -> Response {
    warn!(?error, "Malformed control form");
    (error.status(), error.body_text()).into_response()
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

/// Reads the control form, url-encoded or multipart. An attached video is
/// stored in `save_dir` when one is given and skipped otherwise.
async fn read_control_form(
    request: Request,
    save_dir: Option<&Path>,
) -> Result<(StartForm, Option<AttachedVideo>), Response> {
    if !is_multipart(&request) {
        let Form(form) = Form::<StartForm>::from_request(request, &())
            .await
            .map_err(IntoResponse::into_response)?;
        return Ok((form, None));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut form = StartForm::default();
    let mut attached = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == UPLOAD_FIELD {
            // an empty file input still sends a part with no filename
            let raw_name = field.file_name().unwrap_or_default().to_string();
            let Some(dir) = save_dir.filter(|_| !raw_name.is_empty()) else {
                continue;
            };
            attached = Some(match sanitize_upload_name(&raw_name) {
                None => AttachedVideo::InvalidName,
                Some(file_name) => match store_field(field, dir, &file_name).await {
                    Ok((path, size)) => {
                        info!(path = %path.display(), size, "Stored video from control form");
                        AttachedVideo::Saved(path)
                    }
                    Err(error) => AttachedVideo::Failed(error),
                },
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "selected" => form.selected = value,
            "path" => form.path = value,
            "stream_key" => form.stream_key = value,
            "shorts" => form.shorts = Some(value),
            "loop_video" => form.loop_video = Some(value),
            _ => {}
        }
    }

    Ok((form, attached))
}

async fn control_view(state: &AppState, form: Option<&StartForm>, notices: Vec<Notice>) -> ControlView {
    let videos = list_videos(state.workspace())
        .await
        .inspect_err(|error| warn!(?error, "Failed to list videos"))
        .unwrap_or_default();
    let status = state.controller.lock().await.status().await;
    let log_lines = state.log.recent(state.log_display).await;

    let mut view = ControlView {
        videos,
        upload_url: state.upload_link().map(str::to_string),
        status: Some(status),
        notices,
        log_lines,
        ..Default::default()
    };
    if let Some(form) = form {
        view.selected = form.selected.clone();
        view.manual_path = form.path.clone();
        view.shorts = form.shorts();
        view.loop_forever = form.loop_video();
    }
    view
}

pub async fn index(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let view = control_view(&state, None, Vec::new()).await;
    Html(render_control_page(&view))
}

async fn render(
    state: &AppState,
    form: &StartForm,
    notices: Vec<Notice>,
    status: StatusCode,
) -> Response {
    let view = control_view(state, Some(form), notices).await;
    (status, Html(render_control_page(&view))).into_response()
}

pub async fn start_stream(Extension(state): Extension<AppState>, request: Request) -> Response {
    let (form, attached) = match read_control_form(request, Some(state.workspace())).await {
        Ok(parsed) => parsed,
        Err(rejection) => return rejection,
    };
    let mut notices = Vec::new();

    let mut choice = resolve_source(state.workspace(), &form.selected, &form.path).await;
    if let Some(warning) = choice.warning {
        notices.push(Notice::warning(warning));
    }

    // an attached video wins over the other sources
    match attached {
        Some(AttachedVideo::Saved(path)) => {
            notices.push(Notice::success(format!("Saved upload as {}", path.display())));
            choice.path = Some(path);
        }
        Some(AttachedVideo::InvalidName) => {
            notices.push(Notice::error("Invalid filename"));
            return render(&state, &form, notices, StatusCode::BAD_REQUEST).await;
        }
        Some(AttachedVideo::Failed(error)) => {
            let message = format!("Error saving file: {error}");
            state.log.push(&message).await;
            notices.push(Notice::error(message));
            return render(&state, &form, notices, StatusCode::INTERNAL_SERVER_ERROR).await;
        }
        None => {}
    }

    let request = StreamRequest {
        source: choice.path.unwrap_or_default(),
        stream_key: form.stream_key.clone(),
        shorts: form.shorts(),
        loop_forever: form.loop_video(),
    };

    let result = state.controller.lock().await.start(request).await;
    let status = match result {
        Ok(pid) => {
            info!(pid, "Start requested from control page");
            notices.push(Notice::success(
                "Streaming started, see the log for ffmpeg output.",
            ));
            StatusCode::OK
        }
        Err(error) => {
            match &error {
                StreamError::Spawn(_) => error!(?error, "Start failed"),
                _ => warn!(%error, "Start rejected"),
            }
            notices.push(Notice::error(error.to_string()));
            error.status_code()
        }
    };

    render(&state, &form, notices, status).await
}

pub async fn stop_stream(Extension(state): Extension<AppState>, request: Request) -> Response {
    // the form is only echoed back, a missing or odd body does not block stopping
    let form = read_control_form(request, None)
        .await
        .map(|(form, _)| form)
        .unwrap_or_default();

    let result = state.controller.lock().await.stop().await;
    let (status, notice) = match result {
        Ok(StopReport::Stopped(outcome)) => {
            info!(?outcome, "Stop requested from control page");
            (StatusCode::OK, Notice::success("ffmpeg stopped."))
        }
        Ok(StopReport::Fallback) => (
            StatusCode::OK,
            Notice::warning("Trying to stop ffmpeg through a system command."),
        ),
        Err(error) => (error.status_code(), Notice::error(error.to_string())),
    };

    render(&state, &form, vec![notice], status).await
}

pub async fn logs(Extension(state): Extension<AppState>) -> String {
    state.log.recent(state.log_display).await.join("\n")
}

pub async fn status(Extension(state): Extension<AppState>) -> Json<StreamStatus> {
    Json(state.controller.lock().await.status().await)
}

