use anyhow::{anyhow, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use redis::AsyncCommands;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::app::validation::ValidImage;
use crate::domain::item::ItemReport;
use crate::domain::user::User;
use crate::infra::{cache::RedisCache, storage::ObjectStorage};

const PRESIGNED_TTL_SECONDS: u64 = 14400;

pub const PROFILE_IMAGE_PREFIX: &str = "profile_images";

/// Stores uploaded images and hands out presigned download URLs for them.
#[derive(Clone)]
pub struct MediaService {
    cache: RedisCache,
    storage: ObjectStorage,
    s3_public_endpoint: Option<String>,
}

impl MediaService {
    pub fn new(cache: RedisCache, storage: ObjectStorage, s3_public_endpoint: Option<String>) -> Self {
        Self {
            cache,
            storage,
            s3_public_endpoint,
        }
    }

    /// Uploads `image` under `prefix` and returns the object key.
    pub async fn store_image(&self, prefix: &str, image: &ValidImage) -> Result<String> {
        let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), image.extension);
        self.storage
            .put(&key, image.content_type, image.bytes.clone())
            .await?;
        tracing::debug!(key = %key, bytes = image.bytes.len(), "stored image");
        Ok(key)
    }

    /// Best-effort removal of an object whose row was never written.
    pub async fn discard(&self, key: &str) {
        if let Err(err) = self.storage.delete(key).await {
            tracing::warn!(error = ?err, key = %key, "failed to delete orphaned image");
        }
    }

    pub async fn generate_presigned_get_url(
        &self,
        object_key: Option<&str>,
        expires_in_seconds: u64,
    ) -> Option<String> {
        let key = object_key?;
        let cache_key = format!("presigned:{}", key);

        if let Ok(mut conn) = self.cache.connection().await {
            if let Ok(Some(cached)) = conn.get::<_, Option<String>>(&cache_key).await {
                return Some(cached);
            }
        }

        let presign_config = PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))
            .ok()?;

        let presigned = self
            .storage
            .client()
            .get_object()
            .bucket(self.storage.bucket())
            .key(key)
            .presigned(presign_config)
            .await
            .ok()?;

        let mut url = presigned.uri().to_string();

        if let Some(ref public_endpoint) = self.s3_public_endpoint {
            match rewrite_presigned_url(&url, public_endpoint) {
                Ok(rewritten) => url = rewritten,
                Err(err) => tracing::warn!(error = ?err, "failed to rewrite presigned URL"),
            }
        }

        // Expire the cached copy five minutes before the URL itself.
        let cache_ttl = expires_in_seconds.saturating_sub(300);
        if cache_ttl > 0 {
            if let Ok(mut conn) = self.cache.connection().await {
                let _ = conn.set_ex::<_, _, ()>(&cache_key, &url, cache_ttl).await;
            }
        }

        Some(url)
    }

    pub async fn populate_user_image_url(&self, user: &mut User) {
        user.profile_image_url = self
            .generate_presigned_get_url(user.profile_image_key.as_deref(), PRESIGNED_TTL_SECONDS)
            .await;
    }

    /// Populate image_url for reports (parallelized with futures::join_all)
    pub async fn populate_report_image_urls(&self, reports: &mut [ItemReport]) {
        let futures: Vec<_> = reports
            .iter()
            .enumerate()
            .filter(|(_, r)| r.image_key.is_some())
            .map(|(i, r)| {
                let key = r.image_key.clone();
                async move {
                    let url = self
                        .generate_presigned_get_url(key.as_deref(), PRESIGNED_TTL_SECONDS)
                        .await;
                    (i, url)
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        for (i, url) in results {
            reports[i].image_url = url;
        }
    }
}

fn rewrite_presigned_url(original: &str, public_endpoint: &str) -> Result<String> {
    let mut original_url = Url::parse(original)?;
    let public_url = if public_endpoint.contains("://") {
        Url::parse(public_endpoint)?
    } else {
        Url::parse(&format!("http://{}", public_endpoint))?
    };

    original_url
        .set_scheme(public_url.scheme())
        .map_err(|_| anyhow!("invalid scheme for public endpoint"))?;
    original_url
        .set_host(public_url.host_str())
        .map_err(|_| anyhow!("invalid host for public endpoint"))?;
    original_url.set_port(public_url.port()).ok();

    Ok(original_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_host_and_keeps_signature() {
        let rewritten = rewrite_presigned_url(
            "http://minio:9000/findit/lost_item_images/a.jpg?X-Amz-Signature=abc",
            "https://cdn.example.com",
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "https://cdn.example.com/findit/lost_item_images/a.jpg?X-Amz-Signature=abc"
        );
    }

    #[test]
    fn bare_host_endpoint_defaults_to_http() {
        let rewritten =
            rewrite_presigned_url("https://s3.internal/b/k.png", "localhost:9000").unwrap();
        assert_eq!(rewritten, "http://localhost:9000/b/k.png");
    }

    #[test]
    fn rejects_unparseable_original() {
        assert!(rewrite_presigned_url("not a url", "localhost:9000").is_err());
    }
}
