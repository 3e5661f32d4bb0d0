//! Atomic streaming downloads
//!
//! Bytes are streamed into a hidden temp file next to the target and renamed
//! into place only once the body is complete. A drop guard removes the temp
//! file on every other exit, including the future being dropped mid-stream,
//! so the caller-visible path is either untouched or complete.

pub mod progress;

use crate::common::{FormatUtils, PathUtils};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::client::{ApiClient, ApiRequest};
use futures_util::stream::{Stream, StreamExt};
use reqwest::header::CONTENT_DISPOSITION;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub use progress::{DownloadProgress, ProgressReceiver, ProgressSender, progress_channel};

pub const CHUNK_SIZE: usize = 8192;
pub const FALLBACK_FILE_PREFIX: &str = "download_";

#[derive(Clone)]
pub struct DownloadPipeline {
    client: ApiClient,
    output: Logger,
}

impl DownloadPipeline {
    pub fn new(client: ApiClient, output: Logger) -> Self {
        Self { client, output }
    }

    /// Run `request` and write its body to disk, returning the final path.
    ///
    /// The path is `output_path` if given, else the server's
    /// content-disposition file name inside `default_dir`, else a
    /// timestamped name inside `default_dir`.
    pub async fn download(
        &self,
        request: ApiRequest,
        output_path: Option<&Path>,
        default_dir: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<PathBuf> {
        // Error statuses fail here, before anything touches the disk.
        let response = self.client.execute(request).await?;

        let hint = response
            .header_str(CONTENT_DISPOSITION.as_str())
            .and_then(parse_content_disposition);
        let path = resolve_output_path(output_path, hint.as_deref(), default_dir);
        let total = response.content_length();

        self.output.detail(&format!(
            "Writing {} to {}",
            if total > 0 { self.output.format_size(total) } else { "unknown size".to_string() },
            path.display()
        ));

        let written = write_stream(response.into_stream(), &path, total, progress).await?;
        self.output.detail(&format!(
            "Wrote {} to {}",
            self.output.format_size(written),
            path.display()
        ));
        Ok(path)
    }
}

/// File name suggested by a content-disposition header, reduced to a bare
/// file name. `filename*` wins over `filename`.
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("filename*") {
            // RFC 5987: charset'language'percent-encoded
            let encoded = value.trim().splitn(3, '\'').nth(2).unwrap_or(value.trim());
            extended = decode_percent(encoded);
        } else if key.eq_ignore_ascii_case("filename") {
            plain = Some(value.to_string());
        }
    }

    extended
        .or(plain)
        .and_then(|name| PathUtils::sanitize_file_name(&name))
}

fn decode_percent(value: &str) -> Option<String> {
    // form_urlencoded would turn '+' into a space.
    let escaped = format!("v={}", value.replace('+', "%2B"));
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(_, decoded)| decoded.into_owned())
}

pub fn resolve_output_path(explicit: Option<&Path>, hint: Option<&str>, default_dir: &Path) -> PathBuf {
    match (explicit, hint) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(name)) => default_dir.join(name),
        (None, None) => default_dir.join(format!(
            "{}{}",
            FALLBACK_FILE_PREFIX,
            FormatUtils::unix_timestamp()
        )),
    }
}

/// Removes the temp file unless the download completed.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Stream `body` into `final_path` atomically, returning the byte count.
///
/// Each incoming chunk is written in `CHUNK_SIZE` slices with a progress
/// event after each slice. When `total` is non-zero, a shorter body is an
/// error.
pub async fn write_stream<S>(
    mut body: S,
    final_path: &Path,
    total: u64,
    progress: Option<&ProgressSender>,
) -> Result<u64>
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    PathUtils::ensure_parent_dir(final_path).await?;

    let tmp_path = PathUtils::temp_sibling(final_path);
    let guard = PartialFile::new(tmp_path.clone());
    let mut file = tokio::fs::File::create(&tmp_path).await.map_err(|e| {
        RegistryError::Download(format!("Cannot create {}: {}", tmp_path.display(), e))
    })?;

    let mut downloaded: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| match e {
            RegistryError::Download(_) => e,
            other => RegistryError::Download(format!("stream interrupted: {}", other)),
        })?;

        for slice in chunk.chunks(CHUNK_SIZE) {
            file.write_all(slice).await.map_err(|e| {
                RegistryError::Download(format!("Write to {} failed: {}", final_path.display(), e))
            })?;
            downloaded += slice.len() as u64;
            if let Some(tx) = progress {
                // Nobody listening is fine.
                let _ = tx.send(DownloadProgress { downloaded, total });
            }
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if total > 0 && downloaded < total {
        return Err(RegistryError::Download(format!(
            "truncated body: received {} of {} bytes",
            downloaded, total
        )));
    }

    tokio::fs::rename(&tmp_path, final_path).await.map_err(|e| {
        RegistryError::Download(format!("Cannot move download into {}: {}", final_path.display(), e))
    })?;
    guard.disarm();

    Ok(downloaded)
}
