use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use url::Url;

const DEFAULT_STATIC_ROOT: &str = "/WWW_ROOT/static";
const DEFAULT_BUILD_COMMAND: &str = "docker compose run --rm builder";

/// Fully resolved settings. Paths are decided once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub password: String,
    pub project_root: PathBuf,
    pub pages_dir: PathBuf,
    pub base_url: Url,
    pub index_path: PathBuf,
    pub index_mirrors: Vec<PathBuf>,
    pub skip_build: bool,
    pub build_command: String,
    pub build_timeout: Duration,
    pub max_upload_bytes: usize,
}

fn default_port() -> u16 { 8787 }
fn default_build_timeout_secs() -> u64 { 600 }
fn default_max_upload_bytes() -> usize { 20 * 1024 * 1024 }

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let cwd = std::env::current_dir().context("current dir")?;
        Self::from_lookup(|key| std::env::var(key).ok(), &cwd)
    }

    /// Resolves settings from `lookup` (an environment) relative to `cwd`.
    pub fn from_lookup<F>(lookup: F, cwd: &Path) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = var("UPLOAD_PORT").and_then(|v| v.parse().ok()).unwrap_or(default_port());
        let password = match var("UPLOAD_PASSWORD") {
            Some(p) => p,
            None => {
                tracing::warn!("UPLOAD_PASSWORD not set; using the built-in default");
                "change-me".to_string()
            }
        };
        let project_root = var("PROJECT_ROOT").map(PathBuf::from).unwrap_or_else(|| cwd.to_path_buf());
        let local_static = project_root.join("local_static");

        let static_root = match var("HOST_STATIC_ROOT") {
            Some(root) => PathBuf::from(root),
            None if Path::new(DEFAULT_STATIC_ROOT).exists() => PathBuf::from(DEFAULT_STATIC_ROOT),
            None => local_static.clone(),
        };
        let wanted_pages = var("PAGES_DIR").map(PathBuf::from).unwrap_or_else(|| static_root.join("pages"));
        let pages_dir = ensure_pages_dir(wanted_pages, &local_static)?;

        let base_url = match var("BASE_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => {
                let origin = var("PUBLIC_ORIGIN").unwrap_or_else(|| format!("http://localhost:{port}"));
                let origin = origin.trim_end_matches('/');
                if pages_dir == static_root {
                    parse_base_url(origin)?
                } else {
                    parse_base_url(&format!("{origin}/pages"))?
                }
            }
        };

        let index_path = var("PAGES_INDEX")
            .map(PathBuf::from)
            .unwrap_or_else(|| project_root.join("data/pages.json"));
        let index_mirrors = match var("PAGES_INDEX_MIRRORS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect(),
            None => vec![project_root.join("public/data/pages.json")],
        };

        let skip_build = var("SKIP_BUILD")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let build_command = var("BUILD_COMMAND").unwrap_or_else(|| DEFAULT_BUILD_COMMAND.to_string());
        let build_timeout = Duration::from_secs(
            var("BUILD_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_build_timeout_secs()),
        );
        let max_upload_bytes = var("MAX_UPLOAD_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_max_upload_bytes());

        Ok(Self {
            port,
            password,
            project_root,
            pages_dir,
            base_url,
            index_path,
            index_mirrors,
            skip_build,
            build_command,
            build_timeout,
            max_upload_bytes,
        })
    }
}

/// Creates the pages directory, falling back to `<local_static>/pages`
/// when the configured location cannot be created.
fn ensure_pages_dir(wanted: PathBuf, local_static: &Path) -> anyhow::Result<PathBuf> {
    match std::fs::create_dir_all(&wanted) {
        Ok(()) => Ok(wanted),
        Err(e) => {
            let fallback = local_static.join("pages");
            tracing::warn!(wanted = %wanted.display(), error = %e, fallback = %fallback.display(),
                "cannot create pages dir, using local fallback");
            std::fs::create_dir_all(&fallback)
                .with_context(|| format!("create fallback pages dir {}", fallback.display()))?;
            Ok(fallback)
        }
    }
}

/// Parses a base URL and makes sure relative joins land inside it.
fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let with_slash = if raw.ends_with('/') { raw.to_string() } else { format!("{raw}/") };
    Url::parse(&with_slash).with_context(|| format!("invalid base url {raw:?}"))
}
