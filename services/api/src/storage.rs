//! Avatar object storage

use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Region},
    primitives::ByteStream,
};
use axum::body::Bytes;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

use crate::config::AvatarConfig;

/// Blob store for avatar images
#[async_trait]
pub trait AvatarStorage: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;

    /// Remove an object; removing a missing object succeeds
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Public URL of the object stored under `key`
    fn url(&self, key: &str) -> String;
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// S3 (or S3-compatible) avatar storage
#[derive(Clone)]
pub struct S3AvatarStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3AvatarStorage {
    pub async fn new(config: &AvatarConfig) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        })
    }
}

#[async_trait]
impl AvatarStorage for S3AvatarStorage {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

/// Process-local avatar storage
#[derive(Clone, Default)]
pub struct MemoryAvatarStorage {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    public_base_url: String,
}

impl MemoryAvatarStorage {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            objects: Arc::default(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Keys of every stored object
    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl AvatarStorage for MemoryAvatarStorage {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.objects.lock().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_base_and_key() {
        assert_eq!(join_url("/media/", "avatars/a.png"), "/media/avatars/a.png");
        assert_eq!(
            join_url("https://cdn.example.com", "avatars/a.png"),
            "https://cdn.example.com/avatars/a.png"
        );
    }

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemoryAvatarStorage::new("/media");

        storage
            .put("avatars/a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(storage.keys().await, vec!["avatars/a.png".to_string()]);
        assert_eq!(storage.url("avatars/a.png"), "/media/avatars/a.png");

        storage.delete("avatars/a.png").await.unwrap();
        storage.delete("avatars/a.png").await.unwrap();
        assert!(storage.keys().await.is_empty());
    }
}
