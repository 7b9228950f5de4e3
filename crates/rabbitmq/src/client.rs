//! RabbitMQ client wrapper.
//!
//! Owns connect, durable queue declaration, and subscription with the
//! delivery semantics the worker depends on:
//! - manual acknowledgment (no auto-ack)
//! - prefetch of one, so a second message is never in flight while the
//!   current one is being processed

use gc_core::{Backoff, Error, Result};
use lapin::options::{BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use tracing::{error, info};

use crate::config::RabbitMqConfig;

/// RabbitMQ client for the gc queue.
pub struct QueueClient {
    config: RabbitMqConfig,
}

impl QueueClient {
    pub fn new(config: RabbitMqConfig) -> Self {
        Self { config }
    }

    /// Single connection attempt: open connection and channel, declare the
    /// durable queue (idempotent), set prefetch to one.
    pub async fn connect(&self) -> Result<(Connection, Channel)> {
        info!(
            host = %self.config.host,
            port = self.config.port,
            "Connecting to RabbitMQ"
        );

        let connection =
            Connection::connect(&self.config.amqp_uri(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(
                &self.config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        // One unacked message at a time; processing is strictly serialized.
        channel.basic_qos(1, BasicQosOptions::default()).await?;

        info!(queue = %self.config.queue, "Connected to RabbitMQ");
        Ok((connection, channel))
    }

    /// Connects with retries according to the backoff policy.
    ///
    /// Every AMQP fault is treated as transient; the default policy retries
    /// forever at a fixed delay, so this only returns an error when the
    /// policy caps the attempt count.
    pub async fn connect_with_retry(&self, backoff: &Backoff) -> Result<(Connection, Channel)> {
        let mut attempt = 0u32;
        loop {
            match self.connect().await {
                Ok(pair) => return Ok(pair),
                Err(e) => {
                    error!(
                        host = %self.config.host,
                        port = self.config.port,
                        attempt = attempt + 1,
                        error = %e,
                        "AMQP connection error"
                    );
                    match backoff.delay_for(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(Error::RetriesExhausted {
                                attempts: attempt + 1,
                            })
                        }
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Subscribes to the gc queue with manual acknowledgment.
    pub async fn subscribe(&self, channel: &Channel) -> Result<Consumer> {
        let consumer = channel
            .basic_consume(
                &self.config.queue,
                &self.config.consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(
            queue = %self.config.queue,
            consumer_tag = %self.config.consumer_tag,
            "Subscribed to gc queue"
        );
        Ok(consumer)
    }
}
