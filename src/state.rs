use crate::clients::builder::Builder;
use crate::config::Config;
use crate::services::index::PageIndex;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub index: Arc<PageIndex>,
    pub builder: Arc<Builder>,
    /// Held while probing for a free file name and renaming into it.
    pub placement: Arc<Mutex<()>>,
}
