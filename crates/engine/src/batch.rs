// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-windowed batching queues.
//!
//! A queue accumulates items into a current batch. Every `delay` a background
//! task swaps in an empty batch and hands the old one to a [`BatchProcessor`].
//! Once [`BatchQueue::finish_adding`] is called, one final batch is processed
//! immediately and the queue reports empty.
//!
//! Taking a batch and processing it happen in the same task, so no two flushes
//! of one queue ever overlap. Flush errors go to [`BatchProcessor::on_error`]
//! and never stop the loop.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};

use crate::error::{EngineError, QueueClosed};

/// Accumulator a queue collects items into.
pub trait Batch: Default + Send + 'static {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + 'static> Batch for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl<K: Send + 'static, V: Send + 'static> Batch for IndexMap<K, V> {
    fn len(&self) -> usize {
        IndexMap::len(self)
    }
}

/// Flushes one batch to its destination.
#[async_trait]
pub trait BatchProcessor<B>: Send + Sync + 'static {
    /// Handle one batch. Called with empty batches too.
    async fn process(&self, batch: B) -> Result<(), EngineError>;

    /// Error sink for failed flushes.
    fn on_error(&self, queue: &str, error: &EngineError) {
        tracing::warn!(queue, error = %error, "flush failed");
    }
}

struct State<B> {
    current: B,
    finished: bool,
    started: bool,
}

struct Pump<B> {
    name: &'static str,
    delay: Duration,
    state: Mutex<State<B>>,
    processor: Arc<dyn BatchProcessor<B>>,
    finish_signal: Notify,
    empty: watch::Sender<bool>,
}

impl<B: Batch> Pump<B> {
    fn new(name: &'static str, delay: Duration, processor: Arc<dyn BatchProcessor<B>>) -> Arc<Self> {
        let (empty, _) = watch::channel(false);
        Arc::new(Self {
            name,
            delay,
            state: Mutex::new(State {
                current: B::default(),
                finished: false,
                started: false,
            }),
            processor,
            finish_signal: Notify::new(),
            empty,
        })
    }

    /// Lock the current batch, or `None` once adding has finished.
    fn open_batch(&self) -> Option<MappedMutexGuard<'_, B>> {
        let guard = self.state.lock();
        if guard.finished {
            return None;
        }
        Some(MutexGuard::map(guard, |s| &mut s.current))
    }

    fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.started {
                return;
            }
            state.started = true;
        }
        let pump = Arc::clone(self);
        tokio::spawn(async move { pump.run().await });
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        drop(state);
        // Stores a permit if the loop is not waiting yet
        self.finish_signal.notify_one();
    }

    fn wait_for_empty(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.empty.subscribe();
        async move {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    async fn run(self: Arc<Self>) {
        tracing::debug!(queue = self.name, "processing started");
        loop {
            let finished = self.state.lock().finished;
            if !finished {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = self.finish_signal.notified() => {}
                }
            }

            let (batch, finished) = {
                let mut state = self.state.lock();
                (std::mem::take(&mut state.current), state.finished)
            };
            let count = batch.len();
            if let Err(e) = self.processor.process(batch).await {
                self.processor.on_error(self.name, &e);
            }

            if finished {
                tracing::debug!(queue = self.name, final_batch = count, "queue drained");
                self.empty.send_replace(true);
                return;
            }
        }
    }
}

/// Ordered batching queue.
pub struct BatchQueue<T: Send + 'static> {
    pump: Arc<Pump<Vec<T>>>,
}

impl<T: Send + 'static> Clone for BatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            pump: Arc::clone(&self.pump),
        }
    }
}

impl<T: Send + 'static> BatchQueue<T> {
    pub fn new(
        name: &'static str,
        delay: Duration,
        processor: Arc<dyn BatchProcessor<Vec<T>>>,
    ) -> Self {
        Self {
            pump: Pump::new(name, delay, processor),
        }
    }

    /// Add an item to the current batch.
    ///
    /// Returns `false` (and drops the item) once adding has finished.
    pub fn push(&self, item: T) -> bool {
        match self.pump.open_batch() {
            Some(mut batch) => {
                batch.push(item);
                true
            }
            None => {
                tracing::trace!(queue = self.pump.name, "item dropped after finish");
                false
            }
        }
    }

    /// Start the flush loop. Idempotent.
    pub fn start_processing(&self) {
        self.pump.start();
    }

    /// Stop accepting items and flush what is left without waiting.
    pub fn finish_adding(&self) {
        self.pump.finish();
    }

    /// Resolves once adding has finished and the final batch was processed.
    pub fn wait_for_empty(&self) -> impl Future<Output = ()> + Send + 'static {
        self.pump.wait_for_empty()
    }
}

/// Keyed batching queue: updates to the same key coalesce into one value
/// per flush, in first-touched order.
pub struct BatchMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    pump: Arc<Pump<IndexMap<K, V>>>,
    factory: Arc<dyn Fn(&K) -> V + Send + Sync>,
}

impl<K, V> Clone for BatchMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            pump: Arc::clone(&self.pump),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<K, V> BatchMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new(
        name: &'static str,
        delay: Duration,
        factory: impl Fn(&K) -> V + Send + Sync + 'static,
        processor: Arc<dyn BatchProcessor<IndexMap<K, V>>>,
    ) -> Self {
        Self {
            pump: Pump::new(name, delay, processor),
            factory: Arc::new(factory),
        }
    }

    /// The pending value for `key`, created by the factory if absent.
    ///
    /// The guard locks the whole queue; do not hold it across an `.await`.
    pub fn get_or_add(&self, key: &K) -> Result<MappedMutexGuard<'_, V>, QueueClosed> {
        let batch = self.pump.open_batch().ok_or(QueueClosed)?;
        let factory = &self.factory;
        Ok(MappedMutexGuard::map(batch, |map| {
            map.entry(key.clone()).or_insert_with(|| factory(key))
        }))
    }

    /// Apply `f` to the pending value for `key`.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> Result<(), QueueClosed> {
        let mut value = self.get_or_add(key)?;
        f(&mut value);
        Ok(())
    }

    pub fn start_processing(&self) {
        self.pump.start();
    }

    pub fn finish_adding(&self) {
        self.pump.finish();
    }

    pub fn wait_for_empty(&self) -> impl Future<Output = ()> + Send + 'static {
        self.pump.wait_for_empty()
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
