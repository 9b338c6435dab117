use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::AdapterConfig;
use crate::error::BackendError;
use crate::storage::{
    Bucket, ByteRange, ByteStream, ClientFactory, Completion, DeleteResponse, FileHandle,
    ObjectMetadata, StorageClient, WriteOptions,
};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    pub public: bool,
    pub generation: u64,
    pub updated: i64,
}

type Objects = HashMap<String, HashMap<String, StoredObject>>;

#[derive(Clone)]
pub struct MemoryClient {
    objects: Arc<RwLock<Objects>>,
    generation: Arc<AtomicU64>,
    chunk_size: usize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let objects = self.objects.read().unwrap();
        objects.get(bucket).and_then(|b| b.get(key)).cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.read().unwrap();
        let mut keys: Vec<String> = objects
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageClient for MemoryClient {
    fn bucket(&self, name: &str) -> Arc<dyn Bucket> {
        Arc::new(MemoryBucket {
            name: name.to_string(),
            client: self.clone(),
        })
    }
}

#[async_trait]
impl ClientFactory for MemoryClient {
    async fn connect(
        &self,
        _config: &AdapterConfig,
    ) -> Result<Arc<dyn StorageClient>, BackendError> {
        Ok(Arc::new(self.clone()))
    }
}

struct MemoryBucket {
    name: String,
    client: MemoryClient,
}

impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn file(&self, key: &str) -> Box<dyn FileHandle> {
        Box::new(MemoryFile {
            bucket: self.name.clone(),
            key: key.to_string(),
            client: self.client.clone(),
        })
    }
}

struct MemoryFile {
    bucket: String,
    key: String,
    client: MemoryClient,
}

impl MemoryFile {
    fn get(&self) -> Result<StoredObject, BackendError> {
        self.client
            .object(&self.bucket, &self.key)
            .ok_or_else(|| BackendError::not_found(&self.key))
    }
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn key(&self) -> &str {
        &self.key
    }

    fn delete(&self, done: Completion<DeleteResponse>) -> Result<(), BackendError> {
        let removed = {
            let mut objects = self.client.objects.write().unwrap();
            objects
                .get_mut(&self.bucket)
                .and_then(|b| b.remove(&self.key))
        };
        match removed {
            Some(_) => done(Ok(json!({ "statusCode": 204 }))),
            None => done(Err(BackendError::not_found(&self.key))),
        }
        Ok(())
    }

    fn exists(&self, done: Completion<bool>) -> Result<(), BackendError> {
        done(Ok(self.client.object(&self.bucket, &self.key).is_some()));
        Ok(())
    }

    async fn write(&self, data: Bytes, options: &WriteOptions) -> Result<(), BackendError> {
        let updated = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let object = StoredObject {
            data,
            content_type: options.content_type.clone(),
            metadata: options.metadata.clone(),
            public: false,
            generation: self.client.generation.fetch_add(1, Ordering::SeqCst) + 1,
            updated,
        };

        let mut objects = self.client.objects.write().unwrap();
        objects
            .entry(self.bucket.clone())
            .or_default()
            .insert(self.key.clone(), object);
        Ok(())
    }

    async fn read(&self, range: Option<ByteRange>) -> Result<ByteStream, BackendError> {
        let data = self.get()?.data;
        let data = match range {
            Some(range) => {
                let len = data.len() as u64;
                if range.start >= len {
                    return Err(BackendError::new(format!(
                        "Requested range {} not satisfiable",
                        range.header_value()
                    ))
                    .with_code(416));
                }
                let end = range.end.min(len - 1);
                data.slice(range.start as usize..=end as usize)
            }
            None => data,
        };

        let chunks: Vec<Result<Bytes, BackendError>> = (0..data.len())
            .step_by(self.client.chunk_size)
            .map(|offset| {
                let end = (offset + self.client.chunk_size).min(data.len());
                Ok(data.slice(offset..end))
            })
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn metadata(&self) -> Result<ObjectMetadata, BackendError> {
        let object = self.get()?;
        Ok(ObjectMetadata {
            key: self.key.clone(),
            size: object.data.len() as u64,
            content_type: object.content_type,
            etag: Some(format!("\"{}\"", object.generation)),
            updated: Some(object.updated),
        })
    }

    async fn make_public(&self) -> Result<(), BackendError> {
        let mut objects = self.client.objects.write().unwrap();
        match objects
            .get_mut(&self.bucket)
            .and_then(|b| b.get_mut(&self.key))
        {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(BackendError::not_found(&self.key)),
        }
    }
}
