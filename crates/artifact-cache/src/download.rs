//! Plain URL downloads.
//!
//! The file name of a download is taken from the final URL after
//! redirects, percent-decoded, the way mod hosts serve their files.

use crate::error::{CacheError, Result};
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::info;

/// Derive a local file name from the last path segment of `url`.
///
/// Returns `None` for URLs ending in `/`, for hidden (dot) names, and for
/// names that would escape the target directory after decoding.
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode_binary(segment.as_bytes());
    let name = String::from_utf8_lossy(&decoded).into_owned();
    if name.is_empty() || name.starts_with('.') || name.contains('/') || name.contains('\\') {
        return None;
    }
    Some(name)
}

/// Send a GET and fail on transport errors or non-success statuses.
pub(crate) async fn get_checked(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CacheError::unreachable(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CacheError::FetchStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Download `url` into `dir` under its resolved file name.
///
/// If a file with that name already exists in `dir` the body is not
/// written and the existing path is returned.
pub async fn download_to_dir(client: &reqwest::Client, url: &str, dir: &Path) -> Result<PathBuf> {
    let response = get_checked(client, url).await?;
    let final_url = response.url().clone();
    let file_name =
        file_name_from_url(&final_url).ok_or_else(|| CacheError::NoFileName(final_url.to_string()))?;
    let dest = dir.join(&file_name);

    if dest.is_file() {
        info!(file = %file_name, "download skipped, already present");
        return Ok(dest);
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| CacheError::unreachable(url, e))?;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&dest, &body).await?;
    info!(file = %file_name, bytes = body.len(), "download done");

    Ok(dest)
}
