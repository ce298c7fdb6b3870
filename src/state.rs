use crate::config::Config;
use crate::engine::Services;
use crate::feed::ChangeFeed;
use crate::utils::query_generation::QueryGenerations;

/// Shared by every worker; cloned into `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub config: Config,
    pub feed: ChangeFeed,
    pub generations: QueryGenerations,
}
