//! Clickflow - click-event pipeline for shortened links
//!
//! Consumes click events from a queue, enriches them with geo and device
//! attributes, flags repeat visits inside a short dedup window and persists
//! one analytics row per delivery.
//!
//! # Features
//! - **server**: HTTP ingest / stats / health endpoints (default)
//!
//! # Architecture
//! - `analytics`: Click event types, per-job processor and queue worker
//! - `queue`: Durable job queue (Redis, in-memory) with retry and dead letters
//! - `dedup`: Atomic first-seen checks for the repeat-visit window
//! - `services`: Geo and device enrichment
//! - `storage`: SeaORM click store and per-link statistics
//! - `api`: HTTP services
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging

pub mod analytics;
#[cfg(feature = "server")]
pub mod api;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod queue;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
