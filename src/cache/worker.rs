//! Background Codec Worker
//!
//! Runs codec jobs on the blocking pool. Requests travel over one channel,
//! replies over another, and a router task hands each reply to the caller
//! waiting on its request id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::codec::{process_request, CodecWorker, WorkerReply, WorkerRequest};
use crate::error::CodecError;

type PendingReplies = Arc<Mutex<HashMap<Uuid, oneshot::Sender<WorkerReply>>>>;

const CHANNEL_CAPACITY: usize = 64;

// == Background Codec Worker ==
/// Message-passing codec worker backed by tokio tasks.
pub struct BackgroundCodecWorker {
    requests: mpsc::Sender<WorkerRequest>,
    pending: PendingReplies,
}

impl BackgroundCodecWorker {
    /// Spawns the job loop and the reply router on the current runtime.
    /// Both stop when `shutdown` is cancelled.
    pub fn spawn(shutdown: CancellationToken) -> Self {
        let (request_tx, mut request_rx) = mpsc::channel::<WorkerRequest>(CHANNEL_CAPACITY);
        let (reply_tx, mut reply_rx) = mpsc::channel::<WorkerReply>(CHANNEL_CAPACITY);
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    request = request_rx.recv() => match request {
                        Some(request) => request,
                        None => break,
                    },
                };

                let request_id = request.request_id;
                let reply = match tokio::task::spawn_blocking(move || process_request(request)).await
                {
                    Ok(reply) => reply,
                    Err(err) => {
                        warn!(%request_id, "Codec job failed to complete: {}", err);
                        WorkerReply {
                            request_id,
                            result: Err(err.to_string()),
                        }
                    }
                };

                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
            debug!("Codec worker job loop stopped");
        });

        let routes = pending.clone();
        tokio::spawn(async move {
            while let Some(reply) = reply_rx.recv().await {
                let waiter = routes.lock().remove(&reply.request_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(reply);
                    }
                    None => debug!(
                        request_id = %reply.request_id,
                        "Dropping reply for abandoned codec request"
                    ),
                }
            }
            // Dropping the senders wakes every remaining waiter with an error.
            routes.lock().clear();
            debug!("Codec worker reply router stopped");
        });

        Self {
            requests: request_tx,
            pending,
        }
    }

    /// Number of requests still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Unregisters a request id when its caller stops waiting.
struct PendingGuard<'a> {
    pending: &'a PendingReplies,
    request_id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.request_id);
    }
}

#[async_trait]
impl CodecWorker for BackgroundCodecWorker {
    async fn submit(&self, request: WorkerRequest) -> Result<WorkerReply, CodecError> {
        let (tx, rx) = oneshot::channel();
        let request_id = request.request_id;
        self.pending.lock().insert(request_id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id,
        };

        self.requests
            .send(request)
            .await
            .map_err(|_| CodecError::WorkerUnavailable)?;
        rx.await.map_err(|_| CodecError::WorkerUnavailable)
    }
}
