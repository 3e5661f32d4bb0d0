//! Bounded batch execution
//!
//! [`BatchExecutor::run`] drives one future per item, at most `max_workers`
//! at a time, and hands back one [`BatchResult`] per input item in input
//! order. A failing item never stops its siblings.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;

pub const DEFAULT_WORKERS: usize = 4;

/// Shared interrupt flag. Once set, no new batch item is started.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one batch item; `index` is its position in the input
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<T> {
    pub index: usize,
    pub outcome: Result<T>,
}

impl<T> BatchResult<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error_message(&self) -> Option<String> {
        self.outcome.as_ref().err().map(ToString::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub success_count: usize,
    pub total: usize,
}

impl BatchSummary {
    pub fn from_results<T>(results: &[BatchResult<T>]) -> Self {
        Self {
            success_count: results.iter().filter(|r| r.is_ok()).count(),
            total: results.len(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.success_count == self.total
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.success_count, self.total)
    }
}

#[derive(Debug, Clone)]
pub struct BatchExecutor {
    parallel: bool,
    max_workers: usize,
    cancel: CancelFlag,
}

impl BatchExecutor {
    pub fn new(parallel: bool, max_workers: usize) -> Result<Self> {
        ValidationErrorHandler::validate_workers(max_workers)?;
        Ok(Self {
            parallel,
            max_workers,
            cancel: CancelFlag::new(),
        })
    }

    pub fn sequential() -> Self {
        Self {
            parallel: false,
            max_workers: 1,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Run `op` over every item.
    ///
    /// The returned vector has one entry per item and `results[i]` belongs
    /// to `items[i]`, whatever order the operations finished in. Items not
    /// yet started when the cancel flag is set come back as `Cancelled`.
    pub async fn run<I, T, F, Fut>(&self, items: I, op: F) -> Vec<BatchResult<T>>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let items: Vec<I::Item> = items.into_iter().collect();

        if !self.parallel || items.len() <= 1 {
            let mut results = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let outcome = if self.cancel.is_cancelled() {
                    Err(RegistryError::Cancelled)
                } else {
                    op(item).await
                };
                results.push(BatchResult { index, outcome });
            }
            return results;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let op = &op;
        let tasks = items.into_iter().enumerate().map(|(index, item)| {
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) if cancel.is_cancelled() => Err(RegistryError::Cancelled),
                    Ok(_permit) => op(item).await,
                    Err(_) => Err(RegistryError::Cancelled),
                };
                BatchResult { index, outcome }
            }
        });

        // join_all yields results in input order.
        join_all(tasks).await
    }
}
