use std::sync::Arc;

use crate::api::access::RateLimiter;
use crate::config::Config;
use crate::db::Database;
use crate::generation::ContentGenerator;
use crate::llm::ProviderRegistry;
use crate::media::{UploadPolicy, UploadStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub generator: Arc<ContentGenerator>,
    pub uploads: UploadStore,
    pub upload_policy: Arc<UploadPolicy>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        db: Database,
        generator: ContentGenerator,
        uploads: UploadStore,
        upload_policy: UploadPolicy,
        rate_limiter: RateLimiter,
    ) -> Self {
        AppState {
            db,
            generator: Arc::new(generator),
            uploads,
            upload_policy: Arc::new(upload_policy),
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    pub fn from_config(db: Database, config: &Config) -> Self {
        AppState::new(
            db,
            ContentGenerator::new(ProviderRegistry::from_config(config)),
            UploadStore::new(config.upload_dir.clone()),
            UploadPolicy::from_config(config),
            RateLimiter::per_minute(config.rate_limit_per_minute),
        )
    }
}
