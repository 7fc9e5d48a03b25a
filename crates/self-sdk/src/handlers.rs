//! Handler registration and ordered, isolated fan-out.
//!
//! Each registered handler gets a dedicated worker task fed by an
//! unbounded queue. Dispatch pushes an event into every worker's queue
//! under a read lock, so a slow handler never blocks the dispatcher and
//! events reach each handler in arrival order. Every invocation runs on
//! its own spawned task whose join is awaited by the worker, so a panic
//! inside one handler neither kills other handlers nor stops subsequent
//! events.

use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A set of subscribed handlers for events of type `E`.
pub(crate) struct HandlerSet<E: Clone + Send + 'static> {
    workers: RwLock<Vec<mpsc::UnboundedSender<E>>>,
}

impl<E: Clone + Send + 'static> HandlerSet<E> {
    pub(crate) fn new() -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler, spawning its worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn register<F, Fut>(&self, handler: F)
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<E>();
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let handler = Arc::clone(&handler);
                let invocation = tokio::spawn(async move { handler(event).await });
                if let Err(join_error) = invocation.await {
                    if join_error.is_panic() {
                        tracing::warn!("subscribed handler panicked; continuing dispatch");
                    }
                }
            }
        });

        self.workers.write().push(tx);
    }

    /// Deliver `event` to every registered handler's queue.
    ///
    /// Never blocks; dead workers are pruned lazily.
    pub(crate) fn dispatch(&self, event: &E) {
        let workers: Vec<_> = self.workers.read().clone();
        let mut dead = false;

        for worker in &workers {
            if worker.send(event.clone()).is_err() {
                dead = true;
            }
        }

        if dead {
            self.workers.write().retain(|w| !w.is_closed());
        }
    }

}

impl<E: Clone + Send + 'static> Default for HandlerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}
