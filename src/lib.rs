pub mod adapter;
pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod normalize;
pub mod s3_client;
pub mod storage;
pub mod stream;

pub use adapter::GcsAdapter;
pub use config::{AdapterConfig, AdapterOptions, Config, CredentialReference, HmacKey, HostConfig};
pub use error::{BackendError, Error, Result};
pub use key::resolve_key;
pub use memory::MemoryClient;
pub use s3_client::{InteropClientFactory, S3InteropClient};
pub use storage::{
    Bucket, ByteRange, ByteStream, ClientFactory, Completion, DeleteResponse, FileHandle,
    FilesAdapter, ObjectMetadata, SaveOptions, StorageClient, WriteOptions,
};
pub use stream::{BufferedResponse, ResponseHead, ResponseSink, StreamRequest, WriterSink};
