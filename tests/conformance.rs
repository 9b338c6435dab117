//! Behaviour every files adapter has to show, run against the in-memory
//! backend and, when credentials are present in the environment, against a
//! live bucket.

use bytes::Bytes;
use std::sync::Arc;

use gcs_files_adapter::{
    AdapterOptions, BufferedResponse, FilesAdapter, GcsAdapter, HostConfig, MemoryClient,
    SaveOptions, StreamRequest,
};

fn host() -> HostConfig {
    HostConfig {
        mount: "http://localhost:1337/parse".to_string(),
        application_id: "conformance".to_string(),
    }
}

async fn run_adapter_suite(adapter: &dyn FilesAdapter, tag: &str) {
    let filename = format!("conformance-{}.txt", tag);
    let payload = Bytes::from_static(b"hello conformance suite");

    adapter
        .save_file(&filename, payload.clone(), Some("text/plain"), &SaveOptions::default())
        .await
        .expect("save should succeed");

    let read = adapter.read_file(&filename).await.expect("read should succeed");
    assert_eq!(read, payload);

    let mut res = BufferedResponse::new();
    adapter
        .handle_file_stream(&filename, &StreamRequest::with_range("bytes=0-4"), &mut res, None)
        .await
        .expect("stream should succeed");
    assert_eq!(res.status(), Some(206));
    assert_eq!(&res.body[..], b"hello");

    let location = adapter.get_file_location(&host(), &filename);
    assert!(location.ends_with(&filename));

    let response = adapter.delete_file(&filename).await.expect("delete should succeed");
    assert!(!response.is_null());

    let err = adapter
        .read_file(&filename)
        .await
        .expect_err("deleted file should not be readable");
    assert_eq!(err.backend().and_then(|e| e.code()), Some(404));
}

#[tokio::test]
async fn test_memory_backend_conforms() {
    let adapter = GcsAdapter::new(AdapterOptions {
        project_id: Some("projectId".to_string()),
        bucket: Some("bucket".to_string()),
        bucket_prefix: Some("suite/".to_string()),
        ..Default::default()
    })
    .unwrap()
    .with_client(Arc::new(MemoryClient::new().with_chunk_size(4)));

    run_adapter_suite(&adapter, "memory").await;
}

#[tokio::test]
async fn test_memory_backend_conforms_through_factory() {
    let memory = MemoryClient::new();
    let adapter = GcsAdapter::new(AdapterOptions {
        bucket: Some("bucket".to_string()),
        direct_access: Some(true),
        ..Default::default()
    })
    .unwrap()
    .with_factory(Arc::new(memory.clone()));

    run_adapter_suite(&adapter, "factory").await;
    assert!(memory.keys("bucket").is_empty());
}

#[tokio::test]
async fn test_live_bucket_conforms() {
    let configured = ["GCP_PROJECT_ID", "GCP_KEYFILE_PATH", "GCS_BUCKET"]
        .iter()
        .all(|name| std::env::var(name).map_or(false, |v| !v.is_empty()));
    if !configured {
        eprintln!("skipping live conformance run: GCP_PROJECT_ID, GCP_KEYFILE_PATH and GCS_BUCKET not set");
        return;
    }

    let adapter = GcsAdapter::from_env().expect("adapter from environment");
    run_adapter_suite(&adapter, "live").await;
}
