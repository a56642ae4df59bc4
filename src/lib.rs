pub mod clients { pub mod builder; }
pub mod config;
pub mod telemetry;
pub mod state;
pub mod error;
pub mod domain { pub mod page; }
pub mod services { pub mod housekeeping; pub mod index; pub mod placement; pub mod sanitize; }
pub mod web { pub mod auth; pub mod dto; pub mod handlers; pub mod router; }

use std::sync::Arc;

use crate::clients::builder::Builder;
use crate::services::{housekeeping, index::PageIndex};
use crate::state::AppState;

pub async fn build_app(cfg: crate::config::Config) -> (axum::Router, u16) {
    housekeeping::sweep_staging(&cfg.pages_dir).await;

    let index = PageIndex::new(cfg.index_path.clone(), cfg.index_mirrors.clone());
    let builder = Builder::new(&cfg.build_command, cfg.project_root.clone(), cfg.build_timeout, cfg.skip_build);
    tracing::info!(
        pages_dir = %cfg.pages_dir.display(),
        base_url = %cfg.base_url,
        index = %cfg.index_path.display(),
        mirrors = cfg.index_mirrors.len(),
        skip_build = cfg.skip_build,
        "configured page publisher"
    );

    let port = cfg.port;
    let state = AppState {
        config: Arc::new(cfg),
        index: Arc::new(index),
        builder: Arc::new(builder),
        placement: Arc::new(tokio::sync::Mutex::new(())),
    };

    (crate::web::router::build_router(state), port)
}
