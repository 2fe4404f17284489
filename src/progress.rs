//! Progress-streaming pipeline runner.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s; the output of one stage
//! is the input of the next. [`ProgressTaskRunner::run`] executes a pipeline
//! on its own tokio task and hands the caller a [`ProgressStream`] that
//! yields every progress message in emission order, followed by exactly one
//! terminal event (`complete` or `error`).
//!
//! Pipelines bound to an artifact cache key complete from the cache when an
//! entry exists, store object-shaped results on success, and are coalesced
//! with concurrent runs for the same key.

use crate::cache::{Artifact, ArtifactCache, CacheKey, CacheNamespace};
use crate::config::RunnerConfig;
use crate::error::{Result, ScholarError};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{OwnedMutexGuard, Semaphore, mpsc};
use tracing::{Instrument, debug, info, warn};

/// Message sent when the worker ends without reporting a terminal event.
const WORKER_LOST_MESSAGE: &str = "pipeline worker stopped before producing a result";

/// Event observed by a pipeline consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Interim, human-readable status.
    Progress {
        /// Status text.
        message: String,
    },
    /// Every stage succeeded.
    Complete {
        /// Output of the final stage (or the cached artifact).
        result: Value,
    },
    /// A stage failed; later stages did not run.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl ProgressEvent {
    /// Progress event with the given message.
    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress {
            message: message.into(),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Handle stages use to publish progress messages.
///
/// Sends never fail from the stage's point of view: once the consumer is
/// gone, messages are dropped and the pipeline keeps running.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressReporter {
    /// Reporter paired with a receiver of the given capacity.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Reporter whose messages go nowhere, for model calls made outside a pipeline run.
    pub fn discard() -> Self {
        let (reporter, _rx) = Self::channel(1);
        reporter
    }

    /// Publish a progress message, waiting for channel capacity.
    pub async fn report(&self, message: impl Into<String>) {
        self.send(ProgressEvent::progress(message)).await;
    }

    /// Publish a progress message from blocking code.
    ///
    /// Must not be called from an async context; use it inside
    /// [`BlockingStage`] closures.
    pub fn report_blocking(&self, message: impl Into<String>) {
        if self
            .tx
            .blocking_send(ProgressEvent::progress(message))
            .is_err()
        {
            debug!("progress consumer gone, dropping message");
        }
    }

    async fn send(&self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("progress consumer gone, dropping event");
        }
    }
}

/// One independently failable unit of pipeline work.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Transform the previous stage's output into this stage's output.
    async fn execute(&self, input: Value, progress: &ProgressReporter) -> Result<Value>;
}

type StageFn = Box<dyn Fn(Value, ProgressReporter) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Stage backed by an async closure.
pub struct FnStage {
    name: String,
    f: StageFn,
}

impl FnStage {
    /// Wrap an async closure as a stage.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, ProgressReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |input, progress| Box::pin(f(input, progress))),
        }
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: Value, progress: &ProgressReporter) -> Result<Value> {
        (self.f)(input, progress.clone()).await
    }
}

type BlockingFn = Arc<dyn Fn(Value, &ProgressReporter) -> Result<Value> + Send + Sync>;

/// Stage backed by a blocking closure, run on the blocking thread pool.
pub struct BlockingStage {
    name: String,
    f: BlockingFn,
}

impl BlockingStage {
    /// Wrap a blocking closure as a stage.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, &ProgressReporter) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

#[async_trait]
impl Stage for BlockingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: Value, progress: &ProgressReporter) -> Result<Value> {
        let f = Arc::clone(&self.f);
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || f(input, &progress))
            .await
            .map_err(|e| ScholarError::Pipeline(format!("blocking stage panicked: {e}")))?
    }
}

/// Ordered stages plus the initial input and an optional cache binding.
pub struct Pipeline {
    name: String,
    input: Value,
    stages: Vec<Box<dyn Stage>>,
    cache_key: Option<(CacheNamespace, CacheKey)>,
}

impl Pipeline {
    /// Empty pipeline that will receive `input` as its first stage's input.
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
            stages: Vec::new(),
            cache_key: None,
        }
    }

    /// Append a stage.
    #[must_use]
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Bind the pipeline's result to an artifact cache entry.
    #[must_use]
    pub fn cached(mut self, namespace: CacheNamespace, key: CacheKey) -> Self {
        self.cache_key = Some((namespace, key));
        self
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, stopping at the first failure.
    async fn execute(&self, progress: &ProgressReporter) -> Result<Value> {
        let mut value = self.input.clone();
        for (index, stage) in self.stages.iter().enumerate() {
            debug!(stage = stage.name(), index, "stage started");
            value = stage.execute(value, progress).await.map_err(|e| {
                warn!(stage = stage.name(), index, "stage failed: {e}");
                e
            })?;
        }
        Ok(value)
    }
}

type InflightMap = HashMap<(CacheNamespace, CacheKey), Arc<tokio::sync::Mutex<()>>>;

/// Executes pipelines on background tasks and streams their progress.
#[derive(Clone)]
pub struct ProgressTaskRunner {
    cache: Option<ArtifactCache>,
    channel_capacity: usize,
    admission: Option<Arc<Semaphore>>,
    inflight: Arc<std::sync::Mutex<InflightMap>>,
}

impl ProgressTaskRunner {
    /// Runner with the given settings and an optional artifact cache.
    pub fn new(config: &RunnerConfig, cache: Option<ArtifactCache>) -> Self {
        Self {
            cache,
            channel_capacity: config.channel_capacity.max(1),
            admission: match config.max_concurrent_runs {
                0 => None,
                limit => Some(Arc::new(Semaphore::new(limit))),
            },
            inflight: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Start `pipeline` on its own task and return its event stream.
    ///
    /// Must be called within a tokio runtime.
    pub fn run(&self, pipeline: Pipeline) -> ProgressStream {
        let (reporter, rx) = ProgressReporter::channel(self.channel_capacity);
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("pipeline", %run_id, name = %pipeline.name);
        let runner = self.clone();

        tokio::spawn(
            async move {
                let terminal = runner.drive(&pipeline, &reporter).await;
                reporter.send(terminal).await;
            }
            .instrument(span),
        );

        ProgressStream {
            rx,
            finished: false,
        }
    }

    /// Run `pipeline`, invoking `on_event` for every event, and return the terminal event.
    pub async fn run_with<F>(&self, pipeline: Pipeline, mut on_event: F) -> ProgressEvent
    where
        F: FnMut(&ProgressEvent),
    {
        let mut stream = self.run(pipeline);
        while let Some(event) = stream.next().await {
            on_event(&event);
            if event.is_terminal() {
                return event;
            }
        }
        ProgressEvent::Error {
            message: WORKER_LOST_MESSAGE.to_owned(),
        }
    }

    async fn drive(&self, pipeline: &Pipeline, progress: &ProgressReporter) -> ProgressEvent {
        let started = std::time::Instant::now();

        let _inflight = match &pipeline.cache_key {
            Some(binding) => Some(self.claim_key(binding, progress).await),
            None => None,
        };

        if let Some(artifact) = self.cached_result(pipeline).await {
            progress.report("Loaded result from cache.").await;
            info!("pipeline served from cache");
            return ProgressEvent::Complete {
                result: Value::Object(artifact),
            };
        }

        let _permit = match &self.admission {
            Some(semaphore) => {
                let semaphore = Arc::clone(semaphore);
                let permit = match Arc::clone(&semaphore).try_acquire_owned() {
                    Ok(permit) => Ok(permit),
                    Err(_) => {
                        progress.report("Waiting for a free worker...").await;
                        semaphore.acquire_owned().await
                    }
                };
                match permit {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        return ProgressEvent::Error {
                            message: format!("runner admission closed: {e}"),
                        };
                    }
                }
            }
            None => None,
        };

        match pipeline.execute(progress).await {
            Ok(result) => {
                self.store_result(pipeline, &result).await;
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "pipeline complete"
                );
                ProgressEvent::Complete { result }
            }
            Err(e) => {
                warn!("pipeline failed: {e}");
                ProgressEvent::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn cached_result(&self, pipeline: &Pipeline) -> Option<Artifact> {
        let cache = self.cache.clone()?;
        let (namespace, key) = pipeline.cache_key.clone()?;
        tokio::task::spawn_blocking(move || cache.get(namespace, &key))
            .await
            .unwrap_or_else(|e| {
                warn!("cache lookup task failed: {e}");
                None
            })
    }

    async fn store_result(&self, pipeline: &Pipeline, result: &Value) {
        let (Some(cache), Some((namespace, key))) = (self.cache.clone(), pipeline.cache_key.clone())
        else {
            return;
        };
        let Value::Object(artifact) = result else {
            debug!("pipeline result is not an object, not cached");
            return;
        };
        let artifact = artifact.clone();
        if let Err(e) =
            tokio::task::spawn_blocking(move || cache.put(namespace, &key, &artifact)).await
        {
            warn!("cache write task failed: {e}");
        }
    }

    /// Serialize runs bound to the same cache key.
    async fn claim_key(
        &self,
        binding: &(CacheNamespace, CacheKey),
        progress: &ProgressReporter,
    ) -> InflightGuard {
        let lock = match self.inflight.lock() {
            Ok(mut map) => Arc::clone(map.entry(binding.clone()).or_default()),
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(binding.clone()).or_default()),
        };

        let guard = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                progress
                    .report("An identical request is already running, waiting for it...")
                    .await;
                Arc::clone(&lock).lock_owned().await
            }
        };

        InflightGuard {
            guard: Some(guard),
            lock,
            binding: binding.clone(),
            inflight: Arc::clone(&self.inflight),
        }
    }

    /// Number of cache keys with a run in flight or waiting.
    pub fn inflight_keys(&self) -> usize {
        match self.inflight.lock() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Holds a key's in-flight lock and removes the map entry once unused.
struct InflightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<tokio::sync::Mutex<()>>,
    binding: (CacheNamespace, CacheKey),
    inflight: Arc<std::sync::Mutex<InflightMap>>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = match self.inflight.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Map entry plus this guard's handle: nobody else is waiting.
        if Arc::strong_count(&self.lock) <= 2 {
            map.remove(&self.binding);
        }
    }
}

/// Consumer side of a pipeline run.
///
/// Yields progress events in order, then exactly one terminal event, then
/// ends. If the worker stops without a terminal event, a single `error`
/// event is synthesized.
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
    finished: bool,
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                    self.rx.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(Some(ProgressEvent::Error {
                    message: WORKER_LOST_MESSAGE.to_owned(),
                }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
