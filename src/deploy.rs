//! The hand-off to the deployment tooling: a manifest of every file in the
//! destination tree with the headers it should be uploaded with. Uploading
//! itself happens elsewhere.

use crate::config::Options;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file to upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    /// The file on disk.
    pub path: PathBuf,

    /// The object key: the path relative to dist, `/`-separated.
    pub key: String,

    pub content_type: &'static str,
    pub cache_control: String,
}

/// Walks `options.dist` (following symlinked asset directories) and lists
/// every file in key order. Hidden files and directories are skipped.
pub fn manifest(options: &Options) -> walkdir::Result<Vec<Upload>> {
    let cache_control = cache_control(options.cache_control_age);
    let mut uploads = Vec::new();
    let walker = WalkDir::new(&options.dist)
        .min_depth(1)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry.file_name().to_str()));
    for result in walker {
        let entry = result?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let key = key(&options.dist, &path);
        uploads.push(Upload {
            content_type: content_type(&path),
            cache_control: cache_control.clone(),
            key,
            path,
        });
    }
    Ok(uploads)
}

fn is_hidden(name: Option<&str>) -> bool {
    name.map_or(false, |name| name.starts_with('.'))
}

fn key(dist: &Path, path: &Path) -> String {
    path.strip_prefix(dist)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The `Cache-Control` header value for a max-age in seconds.
pub fn cache_control(age: u64) -> String {
    format!("max-age={}", age)
}

/// Infers a content type from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("svg") => "image/svg+xml",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("pdf") => "application/pdf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        // Clean-URL pages have no extension.
        None => "text/html",
        Some(_) => "application/octet-stream",
    }
}
