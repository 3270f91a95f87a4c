use std::sync::Arc;

use tokio::sync::Mutex;

use crate::chat::ChatTransport;
use crate::clock::Clock;
use crate::config::Config;
use crate::db::Repository;
use crate::services::IdentityResolver;

#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub clock: Arc<dyn Clock>,
    pub chat: Arc<dyn ChatTransport>,
    pub identity: Arc<IdentityResolver>,
    pub config: Arc<Config>,
    /// Serializes workflow decisions that span more than one collection.
    pub workflow_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        repo: Repository,
        clock: Arc<dyn Clock>,
        chat: Arc<dyn ChatTransport>,
        config: Config,
    ) -> Self {
        Self {
            identity: Arc::new(IdentityResolver::new(repo.clone())),
            repo,
            clock,
            chat,
            config: Arc::new(config),
            workflow_lock: Arc::new(Mutex::new(())),
        }
    }
}
