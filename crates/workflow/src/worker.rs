//! Worker pool consuming the ingestion queue.

use std::sync::Arc;

use ingestion::{DeadLetterQueue, DeadLetterRecord, IngestionQueue, QueueConfig, ReceivedMessage};
use order_store::OrderStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::capabilities::{InventoryCapability, PaymentCapability};
use crate::orchestrator::Orchestrator;

/// Fixed-size pool of independent workers.
///
/// Each worker pulls message batches and drives one order at a time; there
/// is no global lock: per-order exclusivity comes from the queue's
/// visibility lease plus the orchestrator's resume-from-persisted-state
/// idempotency. A message is acknowledged only after the order reached a
/// terminal status durably; a message past its redelivery budget is
/// quarantined with the order left in its last known status.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` consumer tasks (at least one).
    pub fn spawn<S, P, I, Q, D>(
        orchestrator: Arc<Orchestrator<S, P, I>>,
        queue: Q,
        dead_letters: D,
        config: QueueConfig,
        workers: usize,
    ) -> WorkerPool
    where
        S: OrderStore + 'static,
        P: PaymentCapability + 'static,
        I: InventoryCapability + 'static,
        Q: IngestionQueue + Clone + 'static,
        D: DeadLetterQueue + Clone + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let orchestrator = orchestrator.clone();
                let queue = queue.clone();
                let dead_letters = dead_letters.clone();
                let config = config.clone();
                let shutdown_rx = shutdown_rx.clone();

                tokio::spawn(async move {
                    worker_loop(
                        worker_id,
                        orchestrator,
                        queue,
                        dead_letters,
                        config,
                        shutdown_rx,
                    )
                    .await;
                })
            })
            .collect();

        WorkerPool { shutdown, handles }
    }

    /// Returns the number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Signals shutdown and waits for every worker to finish its current
    /// batch.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop<S, P, I, Q, D>(
    worker_id: usize,
    orchestrator: Arc<Orchestrator<S, P, I>>,
    queue: Q,
    dead_letters: D,
    config: QueueConfig,
    mut shutdown: watch::Receiver<bool>,
) where
    S: OrderStore,
    P: PaymentCapability,
    I: InventoryCapability,
    Q: IngestionQueue,
    D: DeadLetterQueue,
{
    tracing::debug!(worker_id, "worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let batch = match queue.receive(config.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "queue receive failed");
                Vec::new()
            }
        };

        if batch.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
            continue;
        }

        for received in batch {
            handle_message(&orchestrator, &queue, &dead_letters, &config, received).await;
        }
    }

    tracing::debug!(worker_id, "worker stopped");
}

async fn handle_message<S, P, I, Q, D>(
    orchestrator: &Orchestrator<S, P, I>,
    queue: &Q,
    dead_letters: &D,
    config: &QueueConfig,
    received: ReceivedMessage,
) where
    S: OrderStore,
    P: PaymentCapability,
    I: InventoryCapability,
    Q: IngestionQueue,
    D: DeadLetterQueue,
{
    let order_id = received.message.order_id;

    if received.receive_count > config.max_receive_count {
        // Redelivery budget exhausted: quarantine instead of retrying
        // forever. The order keeps its last known status for operator
        // inspection.
        let record = DeadLetterRecord::from_received(&received);
        if let Err(e) = dead_letters.push(record).await {
            tracing::error!(%order_id, error = %e, "failed to quarantine message");
            return;
        }
        if let Err(e) = queue.delete(&received.receipt).await {
            tracing::warn!(%order_id, error = %e, "lease expired before quarantine delete");
        }
        metrics::counter!("messages_quarantined_total").increment(1);
        tracing::error!(
            %order_id,
            receive_count = received.receive_count,
            max_receive_count = config.max_receive_count,
            "message exceeded redelivery budget and was quarantined"
        );
        return;
    }

    match orchestrator.process(order_id).await {
        Ok(status) => {
            tracing::debug!(%order_id, %status, "acknowledging message");
            if let Err(e) = queue.delete(&received.receipt).await {
                // The lease expired mid-processing; the redelivery will
                // observe the terminal status and acknowledge.
                tracing::warn!(%order_id, error = %e, "lease expired before acknowledgment");
            }
        }
        Err(e) => {
            tracing::warn!(%order_id, error = %e, "processing attempt aborted, releasing message");
            if let Err(nack_err) = queue.nack(&received.receipt, &e.to_string()).await {
                tracing::debug!(%order_id, error = %nack_err, "lease already expired on release");
            }
        }
    }
}
