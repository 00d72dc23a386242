//! Correlation-stage collaborator handle.
//!
//! The real correlation engine is an external subsystem; the daemon owns
//! only this thin handle: a task that drains the generation's event bus
//! and counts what it accepted. The handle's `stop` resolves once every
//! producer of the generation has terminated and the bus is drained, which
//! is what the reload orchestrator waits on before declaring the stage
//! stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use logward_core::bus::EventBusReader;

/// Handle to the running correlation stage of one pipeline generation.
pub struct CorrelationStage {
    generation: u64,
    processed: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl CorrelationStage {
    /// Spawn the drain task for this generation's bus reader.
    pub fn start(mut reader: EventBusReader) -> Self {
        let generation = reader.generation();
        let processed = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&processed);

        let task = tokio::spawn(async move {
            while let Some(event) = reader.recv().await {
                tracing::trace!(generation, event = %event, "event accepted by correlation stage");
                counter.fetch_add(1, Ordering::SeqCst);
            }
            tracing::debug!(generation, "event bus drained, correlation stage idle");
        });

        Self {
            generation,
            processed,
            task,
        }
    }

    /// Pipeline generation this stage belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of events accepted so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Shared counter handle, for status reporting across a drain.
    pub fn processed_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.processed)
    }

    /// Wait until the bus is drained (all producers gone), then return the
    /// total number of accepted events.
    ///
    /// The drain normally completes as soon as the last source task drops
    /// its bus sender; the timeout is a backstop against a wedged producer.
    pub async fn stop(mut self, timeout: Duration) -> u64 {
        if tokio::time::timeout(timeout, &mut self.task).await.is_err() {
            tracing::warn!(
                generation = self.generation,
                "correlation stage drain timed out, aborting"
            );
            self.task.abort();
        }
        self.processed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logward_core::bus;
    use logward_core::event::{AcquisitionKind, Event, LogLine};

    fn event(n: usize) -> Event {
        Event::new(
            LogLine::new(format!("line #{n}"), "test:src"),
            AcquisitionKind::LiveStream,
        )
    }

    #[tokio::test]
    async fn counts_accepted_events() {
        let (bus_tx, bus_rx) = bus::channel(16, 0);
        let stage = CorrelationStage::start(bus_rx);

        for n in 0..3 {
            bus_tx.publish(event(n)).await.unwrap();
        }
        drop(bus_tx);

        let total = stage.stop(Duration::from_secs(1)).await;
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn stop_completes_once_producers_are_gone() {
        let (bus_tx, bus_rx) = bus::channel(16, 7);
        let stage = CorrelationStage::start(bus_rx);
        assert_eq!(stage.generation(), 7);

        let producer = {
            let bus = bus_tx.clone();
            tokio::spawn(async move {
                for n in 0..5 {
                    bus.publish(event(n)).await.unwrap();
                }
            })
        };
        drop(bus_tx);
        producer.await.unwrap();

        let total = stage.stop(Duration::from_secs(1)).await;
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn stop_times_out_when_a_producer_is_wedged() {
        let (bus_tx, bus_rx) = bus::channel(16, 0);
        let stage = CorrelationStage::start(bus_rx);

        // Keep a sender alive so the bus never drains.
        let total = stage.stop(Duration::from_millis(50)).await;
        assert_eq!(total, 0);
        drop(bus_tx);
    }
}
