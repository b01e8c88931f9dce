//! Event pipeline for the forum: consumes vote and sign-in events from a
//! durable log, coalesces them in a process-local buffer, and drives tally
//! recomputation and ENS identity hydration on flush.
pub mod buffer;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod metrics;
pub mod orchestrator;
pub mod processor;

pub use buffer::{BufferedEntry, CoalescingBuffer, FlushBatch};
pub use config::PipelineConfig;
pub use consumer::{Delivery, EventConsumer, EventLog, LogEntry, RedisEventLog, StreamEntries};
pub use errors::{ConsumerError, HydrationError, LogError, OrchestratorError};
pub use metrics::PipelineStats;
pub use orchestrator::{Orchestrator, ShutdownHandle};
pub use processor::{IdentityHydrator, VoteAggregator};
