use crate::stream::StreamStatus;

pub fn html_escape(s: &str) -> String {
    htmlescape::encode_minimal(s)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    fn color(&self) -> &'static str {
        match self {
            NoticeLevel::Success => "#1a7f37",
            NoticeLevel::Warning => "#9a6700",
            NoticeLevel::Error => "#b00",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything the control page shows.
#[derive(Debug, Default)]
pub struct ControlView {
    pub videos: Vec<String>,
    pub selected: String,
    pub manual_path: String,
    pub shorts: bool,
    pub loop_forever: bool,
    /// `None` while the upload server is down.
    pub upload_url: Option<String>,
    pub status: Option<StreamStatus>,
    pub notices: Vec<Notice>,
    pub log_lines: Vec<String>,
}

pub const UPLOAD_SERVER_DOWN: &str = "Upload server not running. Check log.";

pub fn render_control_page(view: &ControlView) -> String {
    let notices = view
        .notices
        .iter()
        .map(|n| {
            format!(
                "<p class='notice' style='color:{}'>{}</p>",
                n.level.color(),
                html_escape(&n.message)
            )
        })
        .collect::<String>();

    let mut options = String::from("<option value=\"\">(none)</option>");
    for name in &view.videos {
        let selected = if *name == view.selected { " selected" } else { "" };
        options.push_str(&format!(
            "<option value=\"{0}\"{selected}>{0}</option>",
            html_escape(name)
        ));
    }

    let video_list = if view.videos.is_empty() {
        "<li><em>No video files yet.</em></li>".to_string()
    } else {
        view.videos
            .iter()
            .map(|name| format!("<li>{}</li>", html_escape(name)))
            .collect::<String>()
    };

    let status = match view.status {
        Some(StreamStatus {
            running: true,
            pid: Some(pid),
        }) => format!("ffmpeg running (pid {pid})"),
        Some(StreamStatus { running: true, .. }) => "ffmpeg running".to_string(),
        _ => "idle".to_string(),
    };

    let checked = |on: bool| if on { " checked" } else { "" };
    let log_text = html_escape(&view.log_lines.join("\n"));
    let upload_link = match &view.upload_url {
        Some(url) => {
            let url = html_escape(url);
            format!(
                r#"<p><a href="{url}" target="_blank">Open large upload page</a></p>
      <p class="muted">Or open {url} in a browser. When the server runs on a remote machine, use its IP in the URL.</p>"#
            )
        }
        None => format!(
            "<p class='notice' style='color:{}'>{UPLOAD_SERVER_DOWN}</p>",
            NoticeLevel::Error.color()
        ),
    };

    format!(
        r#"<!doctype html>
<html lang="en"><head>
  <meta charset="utf-8"><title>YouTube Live (Large Uploads)</title>
  <meta name="viewport" content="width=device-width,initial-scale=1">
  <style>
    body{{font-family:system-ui,-apple-system,Segoe UI,Roboto,Arial;color:#222;padding:24px;max-width:1100px;margin:auto}}
    .cols{{display:flex;gap:24px;flex-wrap:wrap}}
    .card{{border:1px solid #ddd;border-radius:12px;padding:18px;margin:12px 0;background:#fff;flex:1;min-width:300px}}
    label{{display:block;margin:10px 0 6px;font-weight:600}}
    select,input[type=text],input[type=password]{{padding:10px;border:1px solid #ccc;border-radius:8px;width:100%;box-sizing:border-box}}
    button{{padding:12px 18px;border:0;border-radius:10px;background:#111;color:#fff;font-weight:700;cursor:pointer;margin-right:8px}}
    pre{{background:#111;color:#ddd;padding:12px;border-radius:8px;height:360px;overflow:auto;white-space:pre-wrap}}
    .muted{{color:#666;font-size:.9em}}
  </style>
</head><body>
  <h1>YouTube Live, large video uploads supported</h1>
  {notices}
  <form method="post" action="/start" enctype="multipart/form-data">
  <div class="cols">
    <div class="card">
      <h2>1) Video source</h2>
      <label for="selected">Video file in the app folder</label>
      <select id="selected" name="selected">{options}</select>
      <label for="path">Or a local path on the server</label>
      <input type="text" id="path" name="path" placeholder="/home/user/video.mp4" value="{manual_path}">
      <label for="upload">Or upload it with this form (use the large upload page for big files)</label>
      <input type="file" id="upload" name="upload" accept=".mp4,.flv,.mkv,.mov">
      <h2>Large file upload</h2>
      {upload_link}
    </div>
    <div class="card">
      <h2>2) Stream settings</h2>
      <label for="stream_key">YouTube stream key</label>
      <input type="password" id="stream_key" name="stream_key" autocomplete="off">
      <label><input type="checkbox" name="shorts"{shorts}> Shorts mode (720x1280)</label>
      <label><input type="checkbox" name="loop_video"{loop_video}> Loop video (stream continuously)</label>
      <h2>ffmpeg control</h2>
      <button type="submit">Start streaming</button>
      <button type="submit" formaction="/stop">Stop streaming</button>
    </div>
  </div>
  </form>
  <h2>Status: <span id="status">{status}</span></h2>
  <pre id="log">{log_text}</pre>
  <h3>Videos in the app folder</h3>
  <ul>{video_list}</ul>
  <p class="muted">This upload server has no authentication. Do not expose it publicly without protection;
  on a public VPS restrict the upload port or use a VPN/SSH tunnel.</p>
  <script>
    setInterval(function(){{
      fetch('/logs').then(function(r){{return r.text();}}).then(function(t){{
        var el=document.getElementById('log'); el.textContent=t; el.scrollTop=el.scrollHeight;
      }}).catch(function(){{}});
    }}, 2000);
  </script>
</body></html>"#,
        manual_path = html_escape(&view.manual_path),
        shorts = checked(view.shorts),
        loop_video = checked(view.loop_forever),
    )
}

pub const UPLOAD_PAGE: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8"/>
    <title>Upload Video (Large File)</title>
  </head>
  <body>
    <h2>Upload video, large files go straight to the server</h2>
    <p>The file is stored in the application folder on the server.</p>
    <input id="fileinput" type="file" />
    <br/><br/>
    <button onclick="upload()">Upload</button>
    <div id="progress"></div>
    <div id="status"></div>
    <script>
    function upload(){
      var f = document.getElementById('fileinput').files[0];
      if(!f){ alert('Choose a file first'); return; }
      var xhr = new XMLHttpRequest();
      xhr.upload.addEventListener('progress', function(e){
        if(e.lengthComputable){
          var p = (e.loaded / e.total * 100).toFixed(2);
          document.getElementById('progress').innerText = 'Progress: ' + p + '%';
        }
      });
      xhr.onreadystatechange = function(){
        if(xhr.readyState==4){
          document.getElementById('status').innerText = xhr.responseText;
        }
      }
      xhr.open('POST', '/upload', true);
      var fd = new FormData();
      fd.append('file', f);
      xhr.send(fd);
    }
    </script>
  </body>
</html>
"#;
