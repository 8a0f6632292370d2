//! S3-backed artifact store

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::{
    ensure_folder, validate_key, ArtifactBody, ArtifactReader, ArtifactStore, StoreError,
    StoreResult,
};

/// Artifact store backed by an S3 bucket, scoped to a key prefix
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Build a store from an existing client
    pub fn new(client: Client, bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: ensure_folder(prefix),
        }
    }

    /// Build a store using the default AWS credential chain
    pub async fn connect(bucket: impl Into<String>, prefix: &str, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        let store = Self::new(Client::new(&config), bucket, prefix);

        info!(bucket = %store.bucket, prefix = %store.prefix, "S3 store configured");
        store
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Split a bucket key found under `full_prefix` into its key relative to
    /// the listing and its key relative to the store root
    fn listed_entry(&self, full_prefix: &str, bucket_key: &str) -> Option<(String, String)> {
        if bucket_key.ends_with('/') {
            return None;
        }
        let rel = bucket_key.strip_prefix(full_prefix)?;
        if rel.is_empty() {
            return None;
        }
        let key = bucket_key.strip_prefix(self.prefix.as_str())?;
        Some((rel.to_string(), key.to_string()))
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn list(&self, prefix: &str) -> StoreResult<BTreeMap<String, String>> {
        let full_prefix = ensure_folder(&self.full_key(prefix));
        let mut result = BTreeMap::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StoreError::backend(DisplayErrorContext(e).to_string()))?;

            for object in output.contents() {
                if let Some((rel, key)) = object.key().and_then(|k| self.listed_entry(&full_prefix, k)) {
                    result.insert(rel, key);
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!(prefix = %full_prefix, count = result.len(), "Listed objects");
        Ok(result)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<ArtifactReader>> {
        validate_key(key)?;
        let full_key = self.full_key(key);

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            Ok(output) => {
                debug!(key = %full_key, "Object found");
                Ok(Some(Box::pin(output.body.into_async_read())))
            }
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    debug!(key = %full_key, "Object not found");
                    return Ok(None);
                }
                Err(StoreError::backend(DisplayErrorContext(err).to_string()))
            }
        }
    }

    async fn put(&self, key: &str, body: ArtifactBody) -> StoreResult<()> {
        validate_key(key)?;
        let full_key = self.full_key(key);

        let stream = match body {
            ArtifactBody::Bytes(bytes) => ByteStream::from(bytes),
            ArtifactBody::File(path) => ByteStream::from_path(&path)
                .await
                .map_err(|e| StoreError::backend(format!("{}: {}", path.display(), e)))?,
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(stream)
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(e).to_string()))?;

        debug!(key = %full_key, "Object stored");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_store(prefix: &str) -> S3Store {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        S3Store::new(Client::from_conf(config), "bucket", prefix)
    }

    #[test]
    fn keys_are_namespaced() {
        let store = offline_store("guild/channel");
        assert_eq!(store.full_key("state/save.zip"), "guild/channel/state/save.zip");
        assert_eq!(store.describe(), "s3://bucket/guild/channel/");
    }

    #[test]
    fn empty_prefix_is_root() {
        let store = offline_store("");
        assert_eq!(store.full_key("game.tar.xz"), "game.tar.xz");
    }

    #[test]
    fn listed_keys_are_relative_to_root() {
        let store = offline_store("guild/channel");
        let full_prefix = ensure_folder(&store.full_key("state"));

        assert_eq!(
            store.listed_entry(&full_prefix, "guild/channel/state/factorio/mods/mod-list.json"),
            Some((
                "factorio/mods/mod-list.json".to_string(),
                "state/factorio/mods/mod-list.json".to_string()
            ))
        );

        let root = offline_store("");
        assert_eq!(
            root.listed_entry("state/", "state/save.zip"),
            Some(("save.zip".to_string(), "state/save.zip".to_string()))
        );
    }

    #[test]
    fn folder_markers_are_not_listed() {
        let store = offline_store("guild/channel");
        let full_prefix = "guild/channel/state/";

        assert_eq!(store.listed_entry(full_prefix, "guild/channel/state/factorio/"), None);
        assert_eq!(store.listed_entry(full_prefix, "guild/channel/state/"), None);
        assert_eq!(store.listed_entry(full_prefix, "elsewhere/state/save.zip"), None);
    }
}
