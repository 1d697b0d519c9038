mod common;

use common::TestServer;
use reqwest::multipart::{Form, Part};

fn control_form(stream_key: &str, upload: Option<(&str, &[u8])>) -> Form {
    let form = Form::new()
        .percent_encode_noop()
        .text("selected", "")
        .text("path", "")
        .text("stream_key", stream_key.to_string());
    match upload {
        Some((name, data)) => form.part(
            "upload",
            Part::bytes(data.to_vec()).file_name(name.to_string()),
        ),
        None => form,
    }
}

#[tokio::test]
async fn test_control_page_renders() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(server.control_url("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let page = response.text().await.unwrap();
    assert!(page.contains(r#"type="password" id="stream_key""#));
    assert!(page.contains(r#"name="shorts""#));
    assert!(page.contains(r#"name="loop_video""#));
    assert!(page.contains(r#"formaction="/stop""#));
    assert!(page.contains("Open large upload page"));
}

#[tokio::test]
async fn test_status_is_idle_initially() {
    let server = TestServer::start().await;

    let status = server.status().await;
    assert_eq!(status["running"], false);
    assert!(status["pid"].is_null());
}

#[tokio::test]
async fn test_start_without_video() {
    let server = TestServer::start().await;

    let response = server
        .post_form("/start", &[("selected", ""), ("path", ""), ("stream_key", "k")])
        .await;
    assert_eq!(response.status(), 400);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("Select or upload a video first.")
    );
}

#[tokio::test]
async fn test_start_without_stream_key() {
    let server = TestServer::start().await;
    server.upload("clip.mp4", b"not really a video".to_vec()).await;

    let response = server
        .post_form("/start", &[("selected", "clip.mp4"), ("stream_key", "")])
        .await;
    assert_eq!(response.status(), 400);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("Enter the YouTube stream key.")
    );
}

#[tokio::test]
async fn test_missing_manual_path_warns() {
    let server = TestServer::start().await;

    let response = server
        .post_form(
            "/start",
            &[("path", "/definitely/not/here.mp4"), ("stream_key", "k")],
        )
        .await;
    assert_eq!(response.status(), 400);

    let page = response.text().await.unwrap();
    assert!(page.contains("Local path not found on server."));
    assert!(page.contains("Select or upload a video first."));
}

#[tokio::test]
async fn test_stop_without_encoder_falls_back() {
    let server = TestServer::start().await;

    let response = server.post_form("/stop", &[]).await;
    assert_eq!(response.status(), 200);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("Trying to stop ffmpeg through a system command.")
    );

    assert_eq!(server.killer.calls(), ["ffmpeg"]);
    assert!(server.logs().await.contains("(fallback)."));
}

#[tokio::test]
async fn test_logs_show_only_recent_lines() {
    let server = TestServer::start_with(|config| {
        config.log_capacity = 10;
        config.log_display = 3;
    })
    .await;

    for _ in 0..5 {
        server.post_form("/stop", &[]).await;
    }

    let logs = server.logs().await;
    assert_eq!(logs.lines().count(), 3);
    assert!(logs.lines().all(|l| l.ends_with("(fallback).")));
}

#[tokio::test]
async fn test_control_page_survives_busy_upload_port() {
    let busy_port = portpicker::pick_unused_port().expect("No available port");
    let _held = std::net::TcpListener::bind(("0.0.0.0", busy_port)).unwrap();

    let server = TestServer::start_with(move |config| config.upload_port = busy_port).await;

    let response = server
        .client
        .get(server.control_url("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let page = response.text().await.unwrap();
    assert!(page.contains("Upload server not running. Check log."));
    assert!(!page.contains("Open large upload page"));

    assert!(server.logs().await.contains("Upload server failed to start"));
    assert_eq!(server.status().await["running"], false);
}

#[tokio::test]
async fn test_start_with_empty_file_input() {
    let server = TestServer::start().await;

    // no file picked: the browser still sends the part, with an empty name
    let response = server
        .post_multipart("/start", control_form("k", Some(("", &b""[..]))))
        .await;
    assert_eq!(response.status(), 400);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("Select or upload a video first.")
    );
    assert_eq!(std::fs::read_dir(server.workspace()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_start_with_unsavable_upload() {
    let server = TestServer::start().await;
    std::fs::create_dir(server.workspace().join("clip.mp4")).unwrap();

    let response = server
        .post_multipart("/start", control_form("k", Some(("clip.mp4", &b"frames"[..]))))
        .await;
    assert_eq!(response.status(), 500);
    assert!(response.text().await.unwrap().contains("Error saving file:"));

    assert_eq!(server.status().await["running"], false);
    assert!(server.logs().await.contains("Error saving file:"));
    assert!(server.killer.calls().is_empty());
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    /// Writes a stand-in encoder that echoes its arguments and idles.
    fn fake_encoder(dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, "#!/bin/sh\necho \"fake encoder: $*\"\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn wait_for_log(server: &TestServer, needle: &str) -> bool {
        for _ in 0..100 {
            if server.logs().await.contains(needle) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_start_and_stop_stream() {
        let bin_dir = std::env::temp_dir().join(format!("fake-encoder-{}", uuid::Uuid::new_v4()));
        let encoder = fake_encoder(&bin_dir);
        let program = encoder.to_string_lossy().into_owned();

        let server = TestServer::start_with(move |config| {
            config.ffmpeg = program;
            config.log_display = 50;
        })
        .await;
        server.upload("clip.mp4", b"frames".to_vec()).await;

        let response = server
            .post_form(
                "/start",
                &[
                    ("selected", "clip.mp4"),
                    ("stream_key", "live-key-1"),
                    ("shorts", "on"),
                    ("loop_video", "on"),
                ],
            )
            .await;
        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().contains("Streaming started"));

        let status = server.status().await;
        assert_eq!(status["running"], true);
        assert!(status["pid"].as_u64().unwrap() > 0);

        // output of the child reaches the log unmodified
        assert!(wait_for_log(&server, "fake encoder: -re -stream_loop -1 -i").await);
        let logs = server.logs().await;
        assert!(logs.contains("-vf scale=720:1280"));
        assert!(logs.contains("Running ffmpeg:"));

        // only one encoder at a time
        let response = server
            .post_form(
                "/start",
                &[("selected", "clip.mp4"), ("stream_key", "live-key-2")],
            )
            .await;
        assert_eq!(response.status(), 409);
        assert!(response.text().await.unwrap().contains("already running"));

        let response = server.post_form("/stop", &[]).await;
        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().contains("ffmpeg stopped."));
        assert!(server.killer.calls().is_empty());

        let status = server.status().await;
        assert_eq!(status["running"], false);

        server.stop().await;
        std::fs::remove_dir_all(&bin_dir).ok();
    }

    #[tokio::test]
    async fn test_start_with_video_from_control_form() {
        let bin_dir = std::env::temp_dir().join(format!("fake-encoder-{}", uuid::Uuid::new_v4()));
        let encoder = fake_encoder(&bin_dir);
        let program = encoder.to_string_lossy().into_owned();

        let server = TestServer::start_with(move |config| {
            config.ffmpeg = program;
            config.log_display = 50;
        })
        .await;

        let data = (0..9_000u32).map(|i| (i % 253) as u8).collect::<Vec<_>>();
        let response = server
            .post_multipart("/start", control_form("live-key", Some(("fresh.mp4", &data[..]))))
            .await;
        assert_eq!(response.status(), 200);
        let page = response.text().await.unwrap();
        assert!(page.contains("Saved upload as"));
        assert!(page.contains("Streaming started"));

        let stored = std::fs::read(server.workspace().join("fresh.mp4")).unwrap();
        assert_eq!(stored, data);

        // the saved upload is what the encoder streams
        assert!(wait_for_log(&server, "/fresh.mp4 -c:v libx264").await);

        let response = server.post_form("/stop", &[]).await;
        assert_eq!(response.status(), 200);

        server.stop().await;
        std::fs::remove_dir_all(&bin_dir).ok();
    }

    #[tokio::test]
    async fn test_shutdown_stops_encoder() {
        let bin_dir = std::env::temp_dir().join(format!("fake-encoder-{}", uuid::Uuid::new_v4()));
        let encoder = fake_encoder(&bin_dir);
        let program = encoder.to_string_lossy().into_owned();

        let server = TestServer::start_with(move |config| config.ffmpeg = program).await;
        server.upload("clip.mp4", b"frames".to_vec()).await;

        let response = server
            .post_form("/start", &[("selected", "clip.mp4"), ("stream_key", "k")])
            .await;
        assert_eq!(response.status(), 200);
        let pid = server.status().await["pid"].as_u64().unwrap() as libc::pid_t;

        server.stop().await;

        // the encoder is gone once the servers are down
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "encoder {pid} survived shutdown");
        std::fs::remove_dir_all(&bin_dir).ok();
    }
}
