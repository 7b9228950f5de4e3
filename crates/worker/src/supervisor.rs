//! Connection supervisor and outer consume loop.
//!
//! Brings up the broker channel and the database pool, subscribes, and
//! feeds messages one at a time through the gc pipeline. Any transient
//! fault tears the subscription down and re-enters the connect cycle; the
//! broker then redelivers whatever was left unacked.

use futures_util::StreamExt;
use gc_core::{AnalyzedEvent, Backoff, Error, Result};
use lapin::options::BasicAckOptions;
use postgres_store::{PgAnalysisStore, PostgresConfig};
use rabbitmq::QueueClient;
use tracing::{error, info, warn};

use crate::gc::GcWorker;
use crate::reaper::Reaper;

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Backoff policy shared by the broker and database connect loops.
    pub backoff: Backoff,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
        }
    }
}

/// Owns the connect/resubscribe cycle around the gc pipeline.
pub struct GcSupervisor {
    queue: QueueClient,
    postgres: PostgresConfig,
    reaper: Reaper,
    config: SupervisorConfig,
}

impl GcSupervisor {
    pub fn new(
        queue: QueueClient,
        postgres: PostgresConfig,
        reaper: Reaper,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            queue,
            postgres,
            reaper,
            config,
        }
    }

    /// Runs until a fatal error.
    ///
    /// Returning `Ok` is not part of normal operation; the loop is exited
    /// from outside via the shutdown signal, which cancels this future and
    /// drops the broker connection.
    pub async fn run(&self) -> Result<()> {
        loop {
            // Both connections come up before any message is taken. The
            // held connection keeps the channel alive for the whole cycle.
            let (_connection, channel) = self.queue.connect_with_retry(&self.config.backoff).await?;
            let store =
                PgAnalysisStore::connect_with_retry(&self.postgres, &self.config.backoff).await?;

            let consumer = match self.queue.subscribe(&channel).await {
                Ok(consumer) => consumer,
                Err(e) => {
                    error!(error = %e, "Subscribe failed; reconnecting");
                    continue;
                }
            };

            let worker = GcWorker::new(store, self.reaper.clone());

            match self.consume(consumer, &worker).await {
                Ok(()) => {
                    warn!("Consumer stream ended; reconnecting to RabbitMQ and database");
                }
                Err(e) if e.is_transient() => {
                    error!(error = %e, "Connection fault; reconnecting to RabbitMQ and database");
                }
                Err(e @ (Error::Reap { .. } | Error::InvalidRepositoryId(_))) => {
                    // Fatal to the current message only. It stays unacked
                    // and comes back after resubscription.
                    error!(error = %e, "Message processing failed; message left for redelivery");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Inner loop: one delivery at a time (prefetch is 1), ack only after
    /// the pipeline finishes.
    async fn consume(
        &self,
        mut consumer: lapin::Consumer,
        worker: &GcWorker<PgAnalysisStore>,
    ) -> Result<()> {
        info!("Waiting for a new message");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;

            match AnalyzedEvent::from_bytes(&delivery.data) {
                Ok(event) => {
                    worker.handle_event(&event).await?;
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Err(e) => {
                    // A structurally invalid message would be invalid on
                    // every redelivery; drop it and say so loudly.
                    error!(error = %e, "Discarding malformed gc message");
                    delivery.ack(BasicAckOptions::default()).await?;
                }
            }

            info!("Waiting for a new message");
        }

        Ok(())
    }
}
