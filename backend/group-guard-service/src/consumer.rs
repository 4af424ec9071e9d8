//! Redis Streams event consumer.
//!
//! The messaging bridge appends one entry per platform event to a stream, with
//! the JSON-encoded [`Event`] under the `payload` field. Each entry is handed to
//! its own tokio task so one slow or failing decision never holds up the rest.

use crate::engine::ModerationEngine;
use crate::error::Result;
use crate::models::Event;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::time::{self, Duration};

const PAYLOAD_FIELD: &str = "payload";

pub struct ConsumerConfig {
    pub stream_key: String,
    /// Entries fetched per XREAD
    pub batch_size: usize,
    pub block_ms: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stream_key: "group-guard:events".to_string(),
            batch_size: 100,
            block_ms: 5000,
        }
    }
}

/// Decode an event payload as published by the bridge
pub fn parse_event(payload: &str) -> Result<Event> {
    Ok(serde_json::from_str(payload)?)
}

fn payload_of(entry: &StreamId) -> Option<String> {
    entry.get::<String>(PAYLOAD_FIELD)
}

pub struct EventConsumer {
    conn: ConnectionManager,
    engine: Arc<ModerationEngine>,
    config: ConsumerConfig,
}

impl EventConsumer {
    /// Opens a connection used only for the blocking stream reads, so other
    /// Redis users never queue behind an `XREAD BLOCK`.
    pub async fn connect(
        client: redis::Client,
        engine: Arc<ModerationEngine>,
        config: ConsumerConfig,
    ) -> Result<Self> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            engine,
            config,
        })
    }

    /// Read the stream forever, starting with entries appended after startup
    pub async fn run(mut self) -> Result<()> {
        let mut last_id = "$".to_string();
        let options = StreamReadOptions::default()
            .block(self.config.block_ms)
            .count(self.config.batch_size);

        tracing::info!(stream = %self.config.stream_key, "Event consumer started");

        loop {
            let read: redis::RedisResult<StreamReadReply> = self
                .conn
                .xread_options(&[&self.config.stream_key], &[&last_id], &options)
                .await;

            match read {
                Ok(reply) => {
                    for entry in reply.keys.into_iter().flat_map(|k| k.ids) {
                        self.spawn_entry(&entry);
                        last_id = entry.id;
                    }
                }
                Err(e) if e.kind() == redis::ErrorKind::IoError => {
                    time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Event stream read failed");
                    time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn spawn_entry(&self, entry: &StreamId) {
        let Some(payload) = payload_of(entry) else {
            tracing::warn!(entry_id = %entry.id, "Stream entry without payload skipped");
            return;
        };

        let event = match parse_event(&payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(entry_id = %entry.id, error = %e, "Undecodable event skipped");
                return;
            }
        };

        let engine = self.engine.clone();
        let entry_id = entry.id.clone();
        tokio::spawn(async move {
            let group_id = event.group_id().clone();
            let outcome = engine.dispatch(event).await;
            tracing::debug!(
                entry_id = %entry_id,
                group_id = %group_id,
                outcome = ?outcome,
                "Event processed"
            );
        });
    }
}
