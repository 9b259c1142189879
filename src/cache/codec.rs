//! Codec Module
//!
//! Compress/decompress pipeline for large payloads. Work is delegated to a
//! `CodecWorker` when one is attached; the same block format is produced
//! inline whenever the worker is missing, fails, or times out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::entry::duration_to_ms;
use crate::error::CodecError;

/// Payloads smaller than this are never compressed.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

// == Compressed Blob ==
/// A compressed payload plus the length of the bytes it decodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBlob {
    pub bytes: Vec<u8>,
    pub original_len: usize,
}

impl CompressedBlob {
    /// `compressed / original`, the quantity averaged into the stats.
    pub fn ratio(&self) -> f64 {
        if self.original_len == 0 {
            1.0
        } else {
            self.bytes.len() as f64 / self.original_len as f64
        }
    }
}

// == Worker Protocol ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecAction {
    Compress,
    Decompress,
}

/// Message sent to a codec worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub request_id: Uuid,
    pub action: CodecAction,
    pub payload: Vec<u8>,
}

/// Message received from a codec worker; `result` carries either the
/// transformed bytes or the worker's error text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReply {
    pub request_id: Uuid,
    pub result: Result<Vec<u8>, String>,
}

/// A capability that performs codec work off the caller's task.
#[async_trait]
pub trait CodecWorker: Send + Sync {
    async fn submit(&self, request: WorkerRequest) -> Result<WorkerReply, CodecError>;
}

// == Block Format ==
/// Compresses `raw` into a size-prepended LZ4 block.
pub fn compress_block(raw: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(raw)
}

/// Decodes a size-prepended LZ4 block.
pub fn decompress_block(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    lz4_flex::decompress_size_prepended(bytes).map_err(|e| CodecError::Corrupt(e.to_string()))
}

/// Runs one worker request to completion. Shared by worker implementations.
pub fn process_request(request: WorkerRequest) -> WorkerReply {
    let result = match request.action {
        CodecAction::Compress => Ok(compress_block(&request.payload)),
        CodecAction::Decompress => decompress_block(&request.payload).map_err(|e| e.to_string()),
    };
    WorkerReply {
        request_id: request.request_id,
        result,
    }
}

// == Codec ==
/// Front end used by the cache. Cloning shares the worker.
#[derive(Clone)]
pub struct Codec {
    worker: Option<Arc<dyn CodecWorker>>,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl Codec {
    pub fn new(
        worker: Option<Arc<dyn CodecWorker>>,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            worker,
            timeout,
            shutdown,
        }
    }

    /// A codec with no worker; everything runs inline.
    pub fn inline() -> Self {
        Self::new(None, Duration::from_secs(5), CancellationToken::new())
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// True when `len` bytes are worth compressing.
    pub fn should_compress(len: usize) -> bool {
        len >= COMPRESSION_THRESHOLD_BYTES
    }

    // == Compress ==
    pub async fn compress(&self, raw: &[u8]) -> CompressedBlob {
        let bytes = match self.delegate(CodecAction::Compress, raw).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if self.has_worker() {
                    warn!("Codec worker compress failed, compressing inline: {}", err);
                }
                compress_block(raw)
            }
        };
        CompressedBlob {
            bytes,
            original_len: raw.len(),
        }
    }

    // == Decompress ==
    /// Restores the original bytes. A length mismatch or undecodable block is
    /// reported as `CodecError::Corrupt`.
    pub async fn decompress(&self, blob: &CompressedBlob) -> Result<Vec<u8>, CodecError> {
        let bytes = match self.delegate(CodecAction::Decompress, &blob.bytes).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if self.has_worker() {
                    debug!("Codec worker decompress failed, decoding inline: {}", err);
                }
                decompress_block(&blob.bytes)?
            }
        };
        if bytes.len() != blob.original_len {
            return Err(CodecError::Corrupt(format!(
                "expected {} bytes, decoded {}",
                blob.original_len,
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Synchronous decode, used where awaiting is not possible.
    pub fn decompress_inline(blob: &CompressedBlob) -> Result<Vec<u8>, CodecError> {
        decompress_block(&blob.bytes)
    }

    async fn delegate(&self, action: CodecAction, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
        let worker = self.worker.as_ref().ok_or(CodecError::WorkerUnavailable)?;
        if self.shutdown.is_cancelled() {
            return Err(CodecError::WorkerUnavailable);
        }

        let request_id = Uuid::new_v4();
        let request = WorkerRequest {
            request_id,
            action,
            payload: payload.to_vec(),
        };

        let reply = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(CodecError::WorkerUnavailable),
            reply = tokio::time::timeout(self.timeout, worker.submit(request)) => reply,
        };
        let reply = reply.map_err(|_| CodecError::WorkerTimeout(duration_to_ms(self.timeout)))??;

        if reply.request_id != request_id {
            return Err(CodecError::MismatchedReply);
        }
        reply.result.map_err(CodecError::Worker)
    }
}
