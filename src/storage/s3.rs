use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, primitives::ByteStream, Client};
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{ImageStore, StorageError, StoredObject};
use crate::config::S3Config;

/// Images stored in an S3-compatible bucket
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageStore {
    pub async fn from_config(config: &S3Config) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .context("storage.s3.bucket is not set")?;
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let mut loader =
            aws_config::defaults(aws_config::BehaviorVersion::latest()).region(Region::new(region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "retrade-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(builder.build());

        let public_base_url = public_base_url(config, &bucket, &region);

        Ok(Self {
            client,
            bucket,
            public_base_url,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Where uploaded objects can be fetched by browsers
fn public_base_url(config: &S3Config, bucket: &str, region: &str) -> String {
    if let Some(base) = &config.public_base_url {
        return base.trim_end_matches('/').to_string();
    }
    match &config.endpoint {
        Some(endpoint) if config.path_style => {
            format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
        }
        Some(endpoint) => {
            let endpoint = endpoint.trim_end_matches('/');
            match endpoint.split_once("://") {
                Some((scheme, host)) => format!("{}://{}.{}", scheme, bucket, host),
                None => format!("https://{}.{}", bucket, endpoint),
            }
        }
        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("PutObject {}: {}", key, e)))?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = self.key_for(url) else {
            return Ok(());
        };
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DeleteObject {}: {}", key, e)))?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("ListObjectsV2 {}: {}", prefix, e)))?;

            for object in output.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                objects.push(StoredObject {
                    key: key.to_string(),
                    url: format!("{}/{}", self.public_base_url, key),
                    modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), 0)),
                });
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(objects)
    }

    fn key_for(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.public_base_url.as_str())?
            .strip_prefix('/')
            .map(str::to_string)
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_config() -> S3Config {
        S3Config {
            bucket: Some("retrade-images".to_string()),
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_public_url_for_aws() {
        let config = s3_config();
        assert_eq!(
            public_base_url(&config, "retrade-images", "eu-west-1"),
            "https://retrade-images.s3.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn test_public_url_for_path_style_endpoint() {
        let config = S3Config {
            endpoint: Some("http://localhost:9000/".to_string()),
            path_style: true,
            ..s3_config()
        };
        assert_eq!(
            public_base_url(&config, "retrade-images", "eu-west-1"),
            "http://localhost:9000/retrade-images"
        );
    }

    #[test]
    fn test_public_url_for_virtual_host_endpoint() {
        let config = S3Config {
            endpoint: Some("https://r2.example.net".to_string()),
            ..s3_config()
        };
        assert_eq!(
            public_base_url(&config, "retrade-images", "auto"),
            "https://retrade-images.r2.example.net"
        );
    }

    #[test]
    fn test_public_url_override() {
        let config = S3Config {
            public_base_url: Some("https://cdn.example.com/".to_string()),
            ..s3_config()
        };
        assert_eq!(
            public_base_url(&config, "retrade-images", "eu-west-1"),
            "https://cdn.example.com"
        );
    }
}
