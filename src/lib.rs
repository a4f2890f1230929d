pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::auth::AuthService;
use crate::app::claims::ClaimService;
use crate::app::media::MediaService;
use crate::app::notifications::NotificationService;
use crate::app::rate_limiter::RateLimiter;
use crate::app::reports::ReportService;
use crate::app::users::UserService;
use crate::config::AppConfig;
use crate::infra::{cache::RedisCache, db::Db, storage::ObjectStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub storage: ObjectStorage,
    pub image_max_bytes: usize,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub s3_public_endpoint: Option<String>,
}

impl AppState {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let db = Db::connect(config).await?;
        let cache = RedisCache::connect(&config.redis_url).await?;
        let storage = ObjectStorage::new(config).await?;

        Ok(Self {
            db,
            cache,
            storage,
            image_max_bytes: config.image_max_bytes,
            paseto_access_key: config.paseto_access_key,
            paseto_refresh_key: config.paseto_refresh_key,
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
            s3_public_endpoint: config.s3_public_endpoint.clone(),
        })
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.paseto_access_key,
            self.paseto_refresh_key,
            self.access_ttl_minutes,
            self.refresh_ttl_days,
        )
    }

    pub fn media_service(&self) -> MediaService {
        MediaService::new(
            self.cache.clone(),
            self.storage.clone(),
            self.s3_public_endpoint.clone(),
        )
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(self.db.clone(), self.media_service(), self.image_max_bytes)
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(self.db.clone(), self.media_service(), self.image_max_bytes)
    }

    pub fn claim_service(&self) -> ClaimService {
        ClaimService::new(self.db.clone())
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(self.db.clone())
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.cache.clone())
    }
}
