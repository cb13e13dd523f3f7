//! Pool worker: a task owning one slice and its index, driven by messages.

use super::types::WorkerHealth;
use crate::error::{SearchError, SearchResult};
use crate::search::index::{BuildCancel, IndexBuilder, SearchableIndex};
use crate::search::ranking::rank_results;
use crate::search::types::{DataRange, Record, SearchResult as Hit};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const MAILBOX_SIZE: usize = 64;

pub enum WorkerMessage {
    Init {
        records: Vec<Record>,
        builder: Arc<dyn IndexBuilder>,
        reply: oneshot::Sender<SearchResult<usize>>,
    },
    Search {
        query: String,
        limit: usize,
        reply: oneshot::Sender<Vec<Hit>>,
    },
    HealthCheck {
        reply: oneshot::Sender<WorkerHealth>,
    },
}

pub struct WorkerHandle {
    pub id: String,
    pub range: DataRange,
    sender: mpsc::Sender<WorkerMessage>,
    task: JoinHandle<()>,
    cancel: BuildCancel,
}

struct Loaded {
    records: Vec<Record>,
    index: Box<dyn SearchableIndex>,
}

fn gone(id: &str) -> SearchError {
    SearchError::unavailable(id, "worker stopped")
}

impl WorkerHandle {
    pub fn spawn(id: impl Into<String>, range: DataRange) -> Self {
        let id = id.into();
        let (sender, receiver) = mpsc::channel(MAILBOX_SIZE);
        let cancel = BuildCancel::default();
        let task = tokio::spawn(run(id.clone(), range, receiver, cancel.clone()));
        Self {
            id,
            range,
            sender,
            task,
            cancel,
        }
    }

    pub async fn init(&self, records: Vec<Record>, builder: Arc<dyn IndexBuilder>) -> SearchResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(WorkerMessage::Init {
                records,
                builder,
                reply,
            })
            .await
            .map_err(|_| gone(&self.id))?;
        rx.await.map_err(|_| gone(&self.id))?
    }

    pub async fn search(&self, query: &str, limit: usize) -> SearchResult<Vec<Hit>> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(WorkerMessage::Search {
                query: query.to_string(),
                limit,
                reply,
            })
            .await
            .map_err(|_| gone(&self.id))?;
        rx.await.map_err(|_| gone(&self.id))
    }

    pub async fn health_check(&self) -> SearchResult<WorkerHealth> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(WorkerMessage::HealthCheck { reply })
            .await
            .map_err(|_| gone(&self.id))?;
        rx.await.map_err(|_| gone(&self.id))
    }

    /// Stops the worker task and tells any index build still running on a
    /// blocking thread to give up.
    pub fn terminate(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn run(
    id: String,
    range: DataRange,
    mut receiver: mpsc::Receiver<WorkerMessage>,
    cancel: BuildCancel,
) {
    let mut loaded: Option<Loaded> = None;

    while let Some(message) = receiver.recv().await {
        match message {
            WorkerMessage::Init {
                records,
                builder,
                reply,
            } => {
                let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
                let cancel = cancel.clone();
                let built = tokio::task::spawn_blocking(move || builder.build(&texts, &cancel))
                    .await
                    .map_err(|e| SearchError::Index(format!("Index build aborted: {}", e)))
                    .and_then(|result| result);

                let outcome = built.map(|index| {
                    let count = records.len();
                    tracing::debug!("Worker {} indexed {} records ({:?})", id, count, index.kind());
                    loaded = Some(Loaded { records, index });
                    count
                });
                let _ = reply.send(outcome);
            }
            WorkerMessage::Search {
                query,
                limit,
                reply,
            } => {
                let hits = match &loaded {
                    Some(slice) => {
                        let candidates = slice
                            .index
                            .search(&query, limit.saturating_mul(2))
                            .into_iter()
                            .filter_map(|hit| {
                                slice.records.get(hit.offset).map(|record| Hit {
                                    id: record.id.clone(),
                                    text: record.text.clone(),
                                    score: Some(hit.score),
                                    source_unit: Some(id.clone()),
                                    unit_range: Some(range),
                                })
                            })
                            .collect();
                        rank_results(&query, candidates, limit)
                    }
                    None => Vec::new(),
                };
                let _ = reply.send(hits);
            }
            WorkerMessage::HealthCheck { reply } => {
                let _ = reply.send(WorkerHealth {
                    worker_id: id.clone(),
                    healthy: loaded.is_some(),
                    record_count: loaded.as_ref().map(|l| l.records.len()).unwrap_or(0),
                });
            }
        }
    }

    tracing::debug!("Worker {} stopped", id);
}
