//! Model cache with exactly-once load semantics
//!
//! Concurrent first requests for the same identifier collapse into a single
//! load; the completed handle is shared read-only for the process lifetime.
//! Failed loads are never cached, so a later request may retry. Loads run as
//! detached tasks, so a caller that stops waiting cannot abort a load other
//! callers depend on.

use crate::classifier::InferenceModel;
use crate::error::PredictError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

type Handle = Arc<dyn InferenceModel>;
type Outcome = Result<Handle, String>;

enum Slot {
    Ready(Handle),
    Loading(watch::Receiver<Option<Outcome>>),
}

/// Cache of loaded model handles keyed by identifier
pub struct ModelCache {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

/// Counts of cached and in-flight entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub loaded: usize,
    pub loading: usize,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached handle for `identifier`, loading it with `load`
    /// when absent
    ///
    /// At most one load runs per identifier at any time. The first caller
    /// for an uncached identifier starts the load; concurrent callers wait
    /// for that load's outcome instead of starting another, and all of them
    /// observe the same result. A failed load clears the slot before its
    /// failure is published, so a subsequent call retries from scratch.
    pub async fn get_or_load<F, Fut>(
        &self,
        identifier: &str,
        load: F,
    ) -> Result<Handle, PredictError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Handle>> + Send + 'static,
    {
        let mut rx = {
            let mut slots = self.slots.lock().await;
            match slots.get(identifier) {
                Some(Slot::Ready(handle)) => {
                    debug!(model = %identifier, "Model cache hit");
                    return Ok(handle.clone());
                }
                Some(Slot::Loading(rx)) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    slots.insert(identifier.to_string(), Slot::Loading(rx.clone()));
                    self.spawn_load(identifier.to_string(), tx, load());
                    rx
                }
            }
        };

        loop {
            let outcome = rx.borrow_and_update().clone();
            if let Some(outcome) = outcome {
                return outcome.map_err(|reason| PredictError::LoadFailure {
                    model: identifier.to_string(),
                    reason,
                });
            }
            if rx.changed().await.is_err() {
                // Loader task died without publishing an outcome. Clear the
                // stale slot so a later call can retry.
                self.clear_dead_slot(identifier).await;
                return Err(PredictError::LoadFailure {
                    model: identifier.to_string(),
                    reason: "model load aborted before completing".to_string(),
                });
            }
        }
    }

    /// Run the load to completion on its own task and publish the outcome
    ///
    /// The slot map is updated before the outcome is sent, so no waiter can
    /// observe a success that is not yet cached.
    fn spawn_load<Fut>(&self, identifier: String, tx: watch::Sender<Option<Outcome>>, fut: Fut)
    where
        Fut: Future<Output = anyhow::Result<Handle>> + Send + 'static,
    {
        let slots = self.slots.clone();
        tokio::spawn(async move {
            let outcome = match fut.await {
                Ok(handle) => {
                    let mut slots = slots.lock().await;
                    slots.insert(identifier.clone(), Slot::Ready(handle.clone()));
                    info!(model = %identifier, "Model loaded and cached");
                    Ok(handle)
                }
                Err(e) => {
                    let mut slots = slots.lock().await;
                    slots.remove(&identifier);
                    error!(model = %identifier, error = %e, "Model load failed");
                    Err(format!("{e:#}"))
                }
            };
            let _ = tx.send(Some(outcome));
        });
    }

    /// Remove a `Loading` slot whose sender is gone
    async fn clear_dead_slot(&self, identifier: &str) {
        let mut slots = self.slots.lock().await;
        let dead = matches!(
            slots.get(identifier),
            Some(Slot::Loading(stale)) if stale.has_changed().is_err()
        );
        if dead {
            slots.remove(identifier);
        }
    }

    /// Counts of loaded and in-flight entries
    pub async fn stats(&self) -> CacheStats {
        let slots = self.slots.lock().await;
        let loaded = slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count();
        CacheStats {
            loaded,
            loading: slots.len() - loaded,
        }
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}
