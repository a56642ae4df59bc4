use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const STAGING_PREFIX: &str = ".upload-";
const STAGING_SUFFIX: &str = ".part";

/// Fresh hidden path in `dir` for streaming an upload before placement.
pub fn staging_path(dir: &Path) -> PathBuf {
    dir.join(format!("{STAGING_PREFIX}{}{STAGING_SUFFIX}", Uuid::new_v4()))
}

pub fn is_staging_file(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
}

/// Removes staging files left behind by an interrupted upload. Returns how
/// many were removed.
pub async fn sweep_staging(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot scan pages dir for staging files");
            return 0;
        }
    };
    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if !is_staging_file(&name.to_string_lossy()) { continue; }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot remove staging file"),
        }
    }
    if removed > 0 {
        info!(removed, dir = %dir.display(), "cleaned staging files");
    }
    removed
}

/// Best-effort removal of one staging file after a failed upload.
pub async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "cannot remove staging file");
        }
    }
}
