use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use crossbeam_channel::Sender;
use reqwest::blocking::{multipart, Client};
use reqwest::StatusCode;

use crate::models::{
    allowed_extension, mime_for_extension, ErrorResponse, UploadResponse, VideoDescriptor,
    VideosResponse, ALLOWED_EXTENSIONS,
};

pub fn make_client() -> Result<Client> {
    Client::builder()
        .timeout(None)
        .build()
        .context("build http client")
}

pub fn hello(client: &Client, server: &str) -> Result<String> {
    let url = format!("{}/api/hello", server.trim_end_matches('/'));
    let resp = client.get(&url).send().context("request /api/hello")?;
    if !resp.status().is_success() {
        bail!("hello failed with {}", resp.status());
    }
    resp.text().context("read /api/hello response")
}

/// Fetch a listing batch. A 404 is the server's empty-feed signal, not a
/// transport failure.
pub fn fetch_videos(client: &Client, server: &str) -> Result<Vec<VideoDescriptor>> {
    let url = format!("{}/api/videos", server.trim_end_matches('/'));
    let resp = client.get(&url).send().context("request /api/videos")?;
    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(Vec::new());
    }
    if !resp.status().is_success() {
        bail!("videos failed with {}", resp.status());
    }
    let body: VideosResponse = resp.json().context("decode /api/videos response")?;
    Ok(body.videos)
}

/// Download one clip to `dest`.
pub fn download(client: &Client, server: &str, video_url: &str, dest: &Path) -> Result<()> {
    let url = format!("{}{}", server.trim_end_matches('/'), video_url);
    let resp = client
        .get(&url)
        .send()
        .with_context(|| format!("request {video_url}"))?;
    if !resp.status().is_success() {
        bail!("download failed with {}", resp.status());
    }
    let bytes = resp.bytes().context("read video body")?;
    std::fs::write(dest, &bytes).with_context(|| format!("write {}", dest.display()))?;
    Ok(())
}

#[derive(Debug)]
pub struct UploadTicket {
    pub file_name: String,
    pub mime: &'static str,
    pub size: u64,
}

/// Client-side fast-fail mirror of the server's upload checks. The server
/// remains the authority; this only saves a round trip on obvious rejects.
pub fn validate_upload(path: &Path, max_file_size: u64) -> Result<UploadTicket> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("file has no usable name")?
        .to_string();
    let Some(ext) = allowed_extension(&file_name) else {
        bail!(
            "Invalid file type. Allowed extensions: {}",
            ALLOWED_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    };
    let size = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    if size > max_file_size {
        bail!(
            "File too large: {:.2}MB. Maximum file size is {}MB.",
            size as f64 / 1024.0 / 1024.0,
            max_file_size / 1024 / 1024
        );
    }
    Ok(UploadTicket {
        file_name,
        mime: mime_for_extension(&ext),
        size,
    })
}

/// Counts bytes as reqwest pulls them, so the caller can render progress.
struct ProgressReader {
    inner: File,
    sent: u64,
    total: u64,
    progress: Sender<(u64, u64)>,
}

impl Read for ProgressReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.sent += n as u64;
        let _ = self.progress.send((self.sent, self.total));
        Ok(n)
    }
}

/// Upload a clip with its metadata. Returns the URL the server assigned.
/// `progress` receives `(bytes sent, total)` pairs during transmission.
pub fn upload_video(
    client: &Client,
    server: &str,
    path: &Path,
    team_name: &str,
    description: &str,
    max_file_size: u64,
    progress: Sender<(u64, u64)>,
) -> Result<String> {
    let ticket = validate_upload(path, max_file_size)?;

    let reader = ProgressReader {
        inner: File::open(path).with_context(|| format!("open {}", path.display()))?,
        sent: 0,
        total: ticket.size,
        progress,
    };
    let part = multipart::Part::reader(reader)
        .file_name(ticket.file_name.clone())
        .mime_str(ticket.mime)
        .context("build multipart part")?;
    let form = multipart::Form::new()
        .text("teamName", team_name.to_string())
        .text("description", description.to_string())
        .part("video", part);

    let url = format!("{}/api/upload", server.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .multipart(form)
        .send()
        .context("request /api/upload")?;

    let status = resp.status();
    if !status.is_success() {
        // Prefer the server's own message; it names what was wrong.
        let message = resp
            .json::<ErrorResponse>()
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("upload failed with {status}"));
        bail!(message);
    }

    let body: UploadResponse = resp.json().context("decode /api/upload response")?;
    Ok(body.video_url)
}
