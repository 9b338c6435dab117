use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::{AdapterConfig, HostConfig};
use crate::error::{BackendError, Result};
use crate::stream::{ResponseSink, StreamRequest};

pub type Completion<T> = Box<dyn FnOnce(std::result::Result<T, BackendError>) + Send + 'static>;

pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, BackendError>> + Send>>;

pub type DeleteResponse = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub updated: Option<i64>,
}

pub trait StorageClient: Send + Sync {
    fn bucket(&self, name: &str) -> Arc<dyn Bucket>;
}

pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;
    fn file(&self, key: &str) -> Box<dyn FileHandle>;
}

#[async_trait]
pub trait FileHandle: Send + Sync {
    fn key(&self) -> &str;

    /// Deletes the object. Returning `Err` means the call could not be
    /// issued at all; otherwise `done` receives the outcome.
    fn delete(&self, done: Completion<DeleteResponse>) -> std::result::Result<(), BackendError>;

    fn exists(&self, done: Completion<bool>) -> std::result::Result<(), BackendError>;

    /// Uploads `data` in full. Resolves once the backend acknowledged the
    /// finished object.
    async fn write(&self, data: Bytes, options: &WriteOptions) -> std::result::Result<(), BackendError>;

    async fn read(&self, range: Option<ByteRange>) -> std::result::Result<ByteStream, BackendError>;

    async fn metadata(&self) -> std::result::Result<ObjectMetadata, BackendError>;

    async fn make_public(&self) -> std::result::Result<(), BackendError>;
}

#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(
        &self,
        config: &AdapterConfig,
    ) -> std::result::Result<Arc<dyn StorageClient>, BackendError>;
}

#[async_trait]
pub trait FilesAdapter: Send + Sync {
    async fn save_file(
        &self,
        filename: &str,
        data: Bytes,
        content_type: Option<&str>,
        options: &SaveOptions,
    ) -> Result<()>;

    async fn delete_file(&self, filename: &str) -> Result<DeleteResponse>;

    async fn read_file(&self, filename: &str) -> Result<Bytes>;

    fn get_file_location(&self, host: &HostConfig, filename: &str) -> String;

    async fn handle_file_stream(
        &self,
        filename: &str,
        req: &StreamRequest,
        res: &mut dyn ResponseSink,
        content_type: Option<&str>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range() {
        let range = ByteRange { start: 10, end: 19 };
        assert_eq!(range.len(), 10);
        assert_eq!(range.header_value(), "bytes=10-19");
    }

    #[test]
    fn test_save_options_defaults() {
        let options: SaveOptions = serde_json::from_str("{}").unwrap();
        assert!(options.metadata.is_empty());
    }
}
