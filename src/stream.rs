use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::storage::ByteRange;

pub const STATUS_OK: u16 = 200;
pub const STATUS_PARTIAL_CONTENT: u16 = 206;
pub const STATUS_RANGE_NOT_SATISFIABLE: u16 = 416;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRequest {
    pub range: Option<String>,
}

impl StreamRequest {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn with_range(range: impl Into<String>) -> Self {
        Self {
            range: Some(range.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait ResponseSink: Send {
    /// Called once, before any body chunk.
    fn write_head(&mut self, head: ResponseHead);

    async fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()>;

    async fn finish(&mut self) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct BufferedResponse {
    pub head: Option<ResponseHead>,
    pub body: BytesMut,
    pub finished: bool,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<u16> {
        self.head.as_ref().map(|h| h.status)
    }
}

#[async_trait]
impl ResponseSink for BufferedResponse {
    fn write_head(&mut self, head: ResponseHead) {
        self.head = Some(head);
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}

pub struct WriterSink<W> {
    writer: W,
    head: Option<ResponseHead>,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer, head: None }
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> ResponseSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn write_head(&mut self, head: ResponseHead) {
        debug!("Response head: {} {:?}", head.status, head.headers);
        self.head = Some(head);
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.writer.write_all(&chunk).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Interprets a single-range `bytes=` header against `size`.
///
/// Supports `a-b`, `a-` and the suffix form `-n`. The end is clamped to the
/// last byte. Multi-range and malformed headers fall back to [`RangeRequest::Full`].
pub fn parse_range(header: &str, size: u64) -> RangeRequest {
    let spec = match header.trim().strip_prefix("bytes=") {
        Some(spec) if !spec.contains(',') => spec.trim(),
        _ => return RangeRequest::Full,
    };
    let (start_str, end_str) = match spec.split_once('-') {
        Some(parts) => parts,
        None => return RangeRequest::Full,
    };

    if start_str.is_empty() {
        let suffix: u64 = match end_str.parse() {
            Ok(n) => n,
            Err(_) => return RangeRequest::Full,
        };
        if suffix == 0 || size == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return RangeRequest::Partial(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        });
    }

    let start: u64 = match start_str.parse() {
        Ok(n) => n,
        Err(_) => return RangeRequest::Full,
    };
    let end: Option<u64> = if end_str.is_empty() {
        None
    } else {
        match end_str.parse() {
            Ok(n) => Some(n),
            Err(_) => return RangeRequest::Full,
        }
    };

    if size == 0 || start >= size {
        return RangeRequest::Unsatisfiable;
    }
    let end = end.map_or(size - 1, |e| e.min(size - 1));
    if start > end {
        return RangeRequest::Unsatisfiable;
    }
    RangeRequest::Partial(ByteRange { start, end })
}
