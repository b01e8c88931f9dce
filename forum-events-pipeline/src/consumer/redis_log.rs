//! [`EventLog`] over Redis Streams.
//!
//! | Operation | Command |
//! |---|---|
//! | `ensure_group` | `XGROUP CREATE <stream> <group> $ MKSTREAM` |
//! | `claim_stale` | `XAUTOCLAIM <stream> <group> <consumer> <min-idle> <cursor> COUNT n` |
//! | `read_new` | `XREADGROUP GROUP <group> <consumer> COUNT n BLOCK ms STREAMS ... >` |
//! | `ack` | `XACK <stream> <group> <id>` |
//!
//! Event bodies are stored in the `body` field of each stream entry.
//!
//! `XAUTOCLAIM` scans the pending entries list in slices. The cursor returned
//! by each call is kept per stream and group so the next claim resumes the
//! scan; it returns to `0-0` once the whole list has been visited.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, Client, RedisResult};
use tracing::{debug, info};

use crate::consumer::{EventLog, LogEntry, StreamEntries};
use crate::errors::LogError;

const BODY_FIELD: &str = "body";
const CLAIM_SCAN_START: &str = "0-0";
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Added to the block duration so a blocking read is not cut short by the
/// client's own response timeout.
const RESPONSE_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Where the next `XAUTOCLAIM` of each stream and group starts.
#[derive(Debug, Default)]
struct ClaimCursors {
    next: Mutex<HashMap<(String, String), String>>,
}

impl ClaimCursors {
    fn start(&self, stream: &str, group: &str) -> String {
        self.next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(stream.to_string(), group.to_string()))
            .cloned()
            .unwrap_or_else(|| CLAIM_SCAN_START.to_string())
    }

    fn advance(&self, stream: &str, group: &str, next: &str) {
        let mut cursors = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (stream.to_string(), group.to_string());
        if next.is_empty() || next == CLAIM_SCAN_START {
            cursors.remove(&key);
        } else {
            cursors.insert(key, next.to_string());
        }
    }
}

pub struct RedisEventLog {
    connection: ConnectionManager,
    cursors: ClaimCursors,
    closed: AtomicBool,
}

impl RedisEventLog {
    /// Connects to Redis. Fails if the server cannot be reached.
    pub async fn connect(redis_url: &str, read_block: Duration) -> Result<Self, LogError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(CONNECTION_TIMEOUT)
            .set_response_timeout(read_block + RESPONSE_TIMEOUT_MARGIN);

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;
        info!("Connected to Redis");

        Ok(Self {
            connection,
            cursors: ClaimCursors::default(),
            closed: AtomicBool::new(false),
        })
    }

    fn connection(&self) -> Result<ConnectionManager, LogError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LogError::Closed);
        }
        Ok(self.connection.clone())
    }
}

fn to_log_entry(entry: &StreamId) -> LogEntry {
    LogEntry {
        id: entry.id.clone(),
        body: entry.get::<Vec<u8>>(BODY_FIELD).unwrap_or_default(),
    }
}

#[async_trait]
impl EventLog for RedisEventLog {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), LogError> {
        let mut connection = self.connection()?;
        let result: RedisResult<()> = connection.xgroup_create_mkstream(stream, group, "$").await;

        match result {
            Ok(()) => {
                info!(stream, group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(stream, group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_stale(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        max_count: usize,
    ) -> Result<Vec<LogEntry>, LogError> {
        let mut connection = self.connection()?;
        let start = self.cursors.start(stream, group);
        let reply: StreamAutoClaimReply = connection
            .xautoclaim_options(
                stream,
                group,
                consumer,
                min_idle.as_millis() as u64,
                start.as_str(),
                StreamAutoClaimOptions::default().count(max_count),
            )
            .await?;

        self.cursors.advance(stream, group, &reply.next_stream_id);
        debug!(
            stream,
            start = %start,
            next = %reply.next_stream_id,
            claimed = reply.claimed.len(),
            "Claimed stale entries"
        );
        Ok(reply.claimed.iter().map(to_log_entry).collect())
    }

    async fn read_new(
        &self,
        streams: &[String],
        group: &str,
        consumer: &str,
        block: Duration,
        max_count: usize,
    ) -> Result<Vec<StreamEntries>, LogError> {
        let mut connection = self.connection()?;
        let ids = vec![">"; streams.len()];
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .block(block.as_millis() as usize)
            .count(max_count);

        let reply: Option<StreamReadReply> = connection
            .xread_options(streams, ids.as_slice(), &options)
            .await?;

        Ok(reply
            .map(|reply| {
                reply
                    .keys
                    .into_iter()
                    .map(|key| StreamEntries {
                        entries: key.ids.iter().map(to_log_entry).collect(),
                        stream: key.key,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), LogError> {
        let mut connection = self.connection.clone();
        let _: i64 = connection.xack(stream, group, &[id]).await?;
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Closed Redis event log");
        }
    }
}
