use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{Client, config::Credentials, primitives::ByteStream};
use bytes::Bytes;
use chrono::DateTime;
use tracing::debug;

use super::helpers::{HeaderField, classify_header, content_md5, content_type_for};
use super::{ObjectStore, ObjectSummary};
use crate::config::{AuthConfig, UploadOptions};
use crate::error::ConfigError;

/// [`ObjectStore`] backed by any S3-compatible service
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from resolved credentials
    ///
    /// Static credentials are used when an access key id is configured,
    /// otherwise the default AWS provider chain applies.
    pub async fn connect(auth: &AuthConfig) -> Result<Self, ConfigError> {
        auth.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(auth.region.clone()));

        if !auth.access_key_id.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                auth.access_key_id.clone(),
                auth.access_key_secret.clone(),
                None,
                None,
                "artifact-publish",
            ));
        }

        if let Some(endpoint) = &auth.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);

        Ok(Self {
            client,
            bucket: auth.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<ObjectSummary>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .with_context(|| format!("Failed to list s3://{}/{}", self.bucket, prefix))?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
                Some(ObjectSummary { key, last_modified })
            })
            .collect())
    }

    async fn put(&self, key: &str, body: Bytes, options: &UploadOptions) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key, options))
            .content_md5(content_md5(&body))
            .content_length(body.len() as i64);

        for (name, value) in &options.headers {
            request = match classify_header(name) {
                HeaderField::ContentType => request,
                HeaderField::ContentEncoding => request.content_encoding(value),
                HeaderField::CacheControl => request.cache_control(value),
                HeaderField::ContentDisposition => request.content_disposition(value),
                HeaderField::ContentLanguage => request.content_language(value),
                HeaderField::Metadata(meta) => request.metadata(meta, value),
                HeaderField::Unsupported => {
                    debug!("Ignoring unsupported upload header {}", name);
                    request
                }
            };
        }

        request
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;

        Ok(())
    }
}
