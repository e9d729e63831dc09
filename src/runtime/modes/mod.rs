//! Mode routing
//!
//! - Worker mode (queue consumer, default)
//! - Server mode (HTTP ingest / stats / health)
//! - One-shot CLI commands

pub mod cli;
#[cfg(feature = "server")]
pub mod server;
pub mod worker;

pub use cli::{run_config_generate, run_enqueue, run_queue_status};
#[cfg(feature = "server")]
pub use server::run_server;
pub use worker::run_worker;
