use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
use aws_sdk_s3::primitives::ByteStream as SdkByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use futures::stream;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::{AdapterConfig, CredentialReference, HmacKey};
use crate::error::BackendError;
use crate::storage::{
    Bucket, ByteRange, ByteStream, ClientFactory, Completion, DeleteResponse, FileHandle,
    ObjectMetadata, StorageClient, WriteOptions,
};

const INTEROP_REGION: &str = "auto";

pub struct S3InteropClient {
    client: S3Client,
}

impl S3InteropClient {
    pub async fn connect(config: &AdapterConfig) -> Result<Self, BackendError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(INTEROP_REGION))
            .endpoint_url(config.endpoint.clone());

        // Fall back to the default credential chain when nothing is configured.
        let key = match &config.credential {
            Some(CredentialReference::KeyFile(path)) => Some(HmacKey::load(path)?),
            Some(CredentialReference::Hmac(key)) => Some(key.clone()),
            None => None,
        };
        if let Some(key) = key {
            let creds = Credentials::new(
                key.access_key_id,
                key.secret_access_key,
                None,
                None,
                "gcs-hmac",
            );
            loader = loader.credentials_provider(creds);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        debug!(
            "Storage client ready for {} (project {:?})",
            config.endpoint, config.project_id
        );
        Ok(Self {
            client: S3Client::from_conf(s3_config),
        })
    }
}

impl StorageClient for S3InteropClient {
    fn bucket(&self, name: &str) -> Arc<dyn Bucket> {
        Arc::new(S3Bucket {
            client: self.client.clone(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InteropClientFactory;

#[async_trait]
impl ClientFactory for InteropClientFactory {
    async fn connect(
        &self,
        config: &AdapterConfig,
    ) -> Result<Arc<dyn StorageClient>, BackendError> {
        Ok(Arc::new(S3InteropClient::connect(config).await?))
    }
}

struct S3Bucket {
    client: S3Client,
    name: String,
}

impl Bucket for S3Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn file(&self, key: &str) -> Box<dyn FileHandle> {
        Box::new(S3File {
            client: self.client.clone(),
            bucket: self.name.clone(),
            key: key.to_string(),
        })
    }
}

struct S3File {
    client: S3Client,
    bucket: String,
    key: String,
}

fn runtime() -> Result<Handle, BackendError> {
    Handle::try_current()
        .map_err(|e| BackendError::new(format!("No async runtime to issue request: {}", e)))
}

fn backend_error<E>(err: SdkError<E>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    let mut out = BackendError::new(message);
    if let Some(status) = err.raw_response().map(|r| r.status().as_u16()) {
        out = out.with_code(status);
    }
    if let Some(code) = err.code() {
        out = out.with_reason(code);
    }
    out
}

fn delete_response(output: &DeleteObjectOutput) -> DeleteResponse {
    json!({
        "deleteMarker": output.delete_marker(),
        "versionId": output.version_id(),
    })
}

#[async_trait]
impl FileHandle for S3File {
    fn key(&self) -> &str {
        &self.key
    }

    fn delete(&self, done: Completion<DeleteResponse>) -> Result<(), BackendError> {
        let handle = runtime()?;
        let request = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key);
        let key = self.key.clone();

        handle.spawn(async move {
            debug!("Deleting object: {}", key);
            let outcome = request
                .send()
                .await
                .map(|output| delete_response(&output))
                .map_err(backend_error);
            done(outcome);
        });
        Ok(())
    }

    fn exists(&self, done: Completion<bool>) -> Result<(), BackendError> {
        let handle = runtime()?;
        let request = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&self.key);

        handle.spawn(async move {
            let outcome = match request.send().await {
                Ok(_) => Ok(true),
                Err(err)
                    if err
                        .as_service_error()
                        .map_or(false, |e| e.is_not_found()) =>
                {
                    Ok(false)
                }
                Err(err) => Err(backend_error(err)),
            };
            done(outcome);
        });
        Ok(())
    }

    async fn write(&self, data: Bytes, options: &WriteOptions) -> Result<(), BackendError> {
        debug!("Putting object: {} ({} bytes)", self.key, data.len());
        let metadata = if options.metadata.is_empty() {
            None
        } else {
            Some(options.metadata.clone())
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(SdkByteStream::from(data))
            .set_content_type(options.content_type.clone())
            .set_metadata(metadata)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn read(&self, range: Option<ByteRange>) -> Result<ByteStream, BackendError> {
        debug!("Getting object: {} range={:?}", self.key, range);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .set_range(range.map(|r| r.header_value()))
            .send()
            .await
            .map_err(backend_error)?;

        let body = stream::try_unfold(output.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, body))),
                Ok(None) => Ok(None),
                Err(e) => Err(BackendError::new(format!("Failed to read object body: {}", e))),
            }
        });
        Ok(Box::pin(body))
    }

    async fn metadata(&self) -> Result<ObjectMetadata, BackendError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(ObjectMetadata {
            key: self.key.clone(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(str::to_string),
            updated: output.last_modified().map(|t| t.secs()),
        })
    }

    async fn make_public(&self) -> Result<(), BackendError> {
        debug!("Granting public read on: {}", self.key);
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(&self.key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
