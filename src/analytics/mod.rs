//! 点击事件处理管线
//!
//! - `event`：队列负载、信封与持久化记录
//! - `processor`：富化 → 去重 → 写入
//! - `worker`：有界并发的队列消费循环

pub mod event;
pub mod processor;
pub mod worker;

pub use event::{ClickEvent, ClickRecord, DedupKey, QueuedJob, parse_timestamp};
pub use processor::{ClickProcessor, JobState, ProcessOutcome, ProcessorSettings};
pub use worker::{ClickWorker, WorkerSettings, WorkerStats, WorkerStatsSnapshot};
