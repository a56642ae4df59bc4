use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use time::OffsetDateTime;
use tracing::{info, warn};
use url::Url;

use crate::domain::page::{iso_millis, PageRecord};
use crate::error::{AppError, Result};
use crate::services::sanitize::strip_html_suffix;

/// Where a page ended up on disk and under which public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
}

impl Placement {
    /// Builds the index record for this page. The timestamp is the file's
    /// modification time, not the time of the request.
    pub async fn to_record(&self, title: &str, description: &str, image: &str) -> Result<PageRecord> {
        let meta = tokio::fs::metadata(&self.path).await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("stat {}: {e}", self.path.display()))
        })?;
        let modified = meta
            .modified()
            .map(OffsetDateTime::from)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());
        Ok(PageRecord {
            url: self.url.clone(),
            title: title.to_string(),
            description: description.to_string(),
            image: image.to_string(),
            created_at: iso_millis(modified),
            extra: Default::default(),
        })
    }
}

/// Moves a freshly transferred file into `dir` under `desired`, appending
/// `-1`, `-2`, ... before the extension until the name is free.
pub async fn place_upload(dir: &Path, desired: &str, staged: &Path, base_url: &Url) -> Result<Placement> {
    let dest = free_destination(dir, desired).await.map_err(|source| AppError::Placement {
        from: staged.to_path_buf(),
        to: dir.join(desired),
        source,
    })?;
    if let Err(source) = tokio::fs::rename(staged, &dest).await {
        warn!(from = %staged.display(), to = %dest.display(), error = %source, "rename failed");
        return Err(AppError::Placement { from: staged.to_path_buf(), to: dest, source });
    }
    info!(from = %staged.display(), to = %dest.display(), "placed upload");
    finish(dest, base_url)
}

/// Resolves a file that was copied into `dir` out of band. The name must
/// match exactly; no collision renaming happens here.
pub async fn locate_existing(dir: &Path, desired: &str, base_url: &Url) -> Result<Placement> {
    let dest = dir.join(desired);
    if !tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        return Err(AppError::NotFound(format!(
            "missing file {desired}; copy it into the pages directory first"
        )));
    }
    finish(dest, base_url)
}

async fn free_destination(dir: &Path, desired: &str) -> std::io::Result<PathBuf> {
    let stem = strip_html_suffix(desired);
    let mut dest = dir.join(desired);
    let mut counter = 1u32;
    while tokio::fs::try_exists(&dest).await? {
        dest = dir.join(format!("{stem}-{counter}.html"));
        counter += 1;
    }
    Ok(dest)
}

fn finish(path: PathBuf, base_url: &Url) -> Result<Placement> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let url = page_url(base_url, &file_name)?;
    Ok(Placement { file_name, path, url })
}

/// Resolves `file_name` against the configured base URL.
pub fn page_url(base_url: &Url, file_name: &str) -> Result<String> {
    base_url
        .join(file_name)
        .map(String::from)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bad page url for {file_name}: {e}")))
}

/// Recovers the page file name from a published URL (or a bare path).
pub fn file_name_from_url(target: &str) -> Option<String> {
    let raw = match Url::parse(target) {
        Ok(parsed) => parsed.path().rsplit('/').next().unwrap_or_default().to_string(),
        Err(_) => target.rsplit(['/', '\\']).next().unwrap_or_default().to_string(),
    };
    let name = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name)
}
