use std::path::{Path, PathBuf};

use reqwest::Client;

use crate::error::ImagegenError;

pub const DEFAULT_PREFIX: &str = "image_";

/// Fetch each URL once and write it to `{dir}/{prefix}{index}.jpeg`.
///
/// Non-200 responses and transport failures are logged and skipped, never
/// retried. Indices follow the input order, so a skipped URL leaves a gap.
/// Returns the paths actually written.
pub async fn download_images(
    client: &Client,
    urls: &[String],
    dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>, ImagegenError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut written = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        if url.is_empty() {
            tracing::warn!(index = i, "job has no result URL, skipping");
            continue;
        }

        let resp = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(index = i, "failed to download {url}: {e}");
                continue;
            }
        };

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!(index = i, status = status.as_u16(), "failed to download {url}");
            continue;
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(index = i, "failed to read body of {url}: {e}");
                continue;
            }
        };

        let path = dir.join(format!("{prefix}{i}.jpeg"));
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "downloaded");
        written.push(path);
    }

    Ok(written)
}
