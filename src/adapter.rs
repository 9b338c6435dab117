use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::{AdapterConfig, AdapterOptions, CredentialReference, HostConfig};
use crate::error::{BackendError, Error, Result};
use crate::normalize::from_callback;
use crate::s3_client::InteropClientFactory;
use crate::storage::{
    ByteRange, ClientFactory, DeleteResponse, FileHandle, FilesAdapter, ObjectMetadata,
    SaveOptions, StorageClient, WriteOptions,
};
use crate::stream::{
    parse_range, RangeRequest, ResponseHead, ResponseSink, StreamRequest, STATUS_OK,
    STATUS_PARTIAL_CONTENT, STATUS_RANGE_NOT_SATISFIABLE,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub struct GcsAdapter {
    config: AdapterConfig,
    factory: Arc<dyn ClientFactory>,
    client: OnceCell<Arc<dyn StorageClient>>,
}

impl GcsAdapter {
    pub fn new(options: AdapterOptions) -> Result<Self> {
        Ok(Self::from_config(AdapterConfig::from_options(options)?))
    }

    pub fn from_positional(
        project_id: impl Into<String>,
        credential: Option<CredentialReference>,
        bucket: Option<&str>,
        extra: AdapterOptions,
    ) -> Result<Self> {
        Self::new(AdapterOptions::positional(project_id, credential, bucket, extra))
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AdapterOptions::from_env())
    }

    pub fn from_config(config: AdapterConfig) -> Self {
        Self {
            config,
            factory: Arc::new(InteropClientFactory),
            client: OnceCell::new(),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn StorageClient>) -> Self {
        self.client = OnceCell::from(client);
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn resolve_key(&self, filename: &str) -> String {
        self.config.resolve_key(filename)
    }

    async fn client(&self) -> Result<&Arc<dyn StorageClient>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                debug!("Creating storage client for bucket {}", self.config.bucket);
                self.factory.connect(&self.config).await
            })
            .await?;
        Ok(client)
    }

    async fn file(&self, filename: &str) -> Result<Box<dyn FileHandle>> {
        let key = self.resolve_key(filename);
        let client = self.client().await?;
        Ok(client.bucket(&self.config.bucket).file(&key))
    }

    pub async fn file_exists(&self, filename: &str) -> Result<bool> {
        let file = self.file(filename).await?;
        debug!("Checking object: {}", file.key());
        Ok(from_callback(|done| file.exists(done)).await?)
    }

    pub async fn get_file_metadata(&self, filename: &str) -> Result<ObjectMetadata> {
        let file = self.file(filename).await?;
        Ok(file.metadata().await?)
    }

    async fn pipe(
        file: &dyn FileHandle,
        range: Option<ByteRange>,
        res: &mut dyn ResponseSink,
    ) -> Result<()> {
        let mut body = file.read(range).await?;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Error::Stream)?;
            res.write_chunk(chunk).await?;
        }
        res.finish().await?;
        Ok(())
    }
}

#[async_trait]
impl FilesAdapter for GcsAdapter {
    async fn save_file(
        &self,
        filename: &str,
        data: Bytes,
        content_type: Option<&str>,
        options: &SaveOptions,
    ) -> Result<()> {
        let file = self.file(filename).await?;
        debug!("Saving object: {} ({} bytes)", file.key(), data.len());

        let write_options = WriteOptions {
            content_type: content_type.map(str::to_string),
            metadata: options.metadata.clone(),
        };
        file.write(data, &write_options).await?;

        if self.config.direct_access {
            file.make_public().await?;
        }
        Ok(())
    }

    async fn delete_file(&self, filename: &str) -> Result<DeleteResponse> {
        let file = self.file(filename).await?;
        debug!("Deleting object: {}", file.key());
        Ok(from_callback(|done| file.delete(done)).await?)
    }

    async fn read_file(&self, filename: &str) -> Result<Bytes> {
        let file = self.file(filename).await?;
        debug!("Reading object: {}", file.key());

        let exists = from_callback(|done| file.exists(done)).await?;
        if !exists {
            return Err(BackendError::not_found(file.key()).into());
        }

        let data = file
            .read(None)
            .await?
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        Ok(data.freeze())
    }

    fn get_file_location(&self, host: &HostConfig, filename: &str) -> String {
        if self.config.direct_access {
            format!(
                "{}/{}/{}",
                self.config.endpoint,
                self.config.bucket,
                self.resolve_key(filename)
            )
        } else {
            format!(
                "{}/files/{}/{}",
                host.mount,
                host.application_id,
                utf8_percent_encode(filename, URI_COMPONENT)
            )
        }
    }

    async fn handle_file_stream(
        &self,
        filename: &str,
        req: &StreamRequest,
        res: &mut dyn ResponseSink,
        content_type: Option<&str>,
    ) -> Result<()> {
        let file = self.file(filename).await?;
        let meta = file.metadata().await?;
        let size = meta.size;
        let content_type = content_type
            .map(str::to_string)
            .or(meta.content_type)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let range = match req.range.as_deref() {
            Some(header) => parse_range(header, size),
            None => RangeRequest::Full,
        };
        debug!("Streaming object: {} {:?}", file.key(), range);

        match range {
            RangeRequest::Partial(range) => {
                res.write_head(
                    ResponseHead::new(STATUS_PARTIAL_CONTENT)
                        .header("Content-Range", format!("bytes {}-{}/{}", range.start, range.end, size))
                        .header("Accept-Ranges", "bytes")
                        .header("Content-Length", range.len().to_string())
                        .header("Content-Type", content_type),
                );
                Self::pipe(file.as_ref(), Some(range), res).await
            }
            RangeRequest::Unsatisfiable => {
                res.write_head(
                    ResponseHead::new(STATUS_RANGE_NOT_SATISFIABLE)
                        .header("Content-Range", format!("bytes */{}", size)),
                );
                res.finish().await?;
                Ok(())
            }
            RangeRequest::Full => {
                res.write_head(
                    ResponseHead::new(STATUS_OK)
                        .header("Accept-Ranges", "bytes")
                        .header("Content-Length", size.to_string())
                        .header("Content-Type", content_type),
                );
                Self::pipe(file.as_ref(), None, res).await
            }
        }
    }
}
