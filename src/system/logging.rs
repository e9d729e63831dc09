//! Logging system initialization
//!
//! This module provides functions to initialize the tracing/logging system
//! based on application configuration.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

use crate::config::LoggingConfig;
use crate::errors::{ClickflowError, Result};

/// Initialize logging system based on configuration
///
/// Sets up file output, daily rotation and text/JSON formatting.
/// `RUST_LOG` overrides the configured level when set.
///
/// # Returns
/// * `WorkerGuard` - Must be kept alive for the duration of the program
///   to ensure non-blocking log writes are flushed
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let log_file = config.file.as_deref().filter(|f| !f.is_empty());

    let writer: Box<dyn std::io::Write + Send + Sync> = match log_file {
        Some(log_file) if config.enable_rotation => {
            let path = Path::new(log_file);
            let dir = path.parent().unwrap_or(Path::new("."));
            let filename = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("clickflow.log");
            let appender = rolling::Builder::new()
                .rotation(rolling::Rotation::DAILY)
                .filename_prefix(filename.trim_end_matches(".log"))
                .filename_suffix("log")
                .max_log_files(config.max_backups as usize)
                .build(dir)
                .map_err(|e| {
                    ClickflowError::file_operation(format!(
                        "Failed to create rolling log appender: {}",
                        e
                    ))
                })?;
            Box::new(appender)
        }
        Some(log_file) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            Box::new(file)
        }
        None => Box::new(std::io::stdout()),
    };

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.clone()));

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(log_file.is_none());

    let init_result = if config.format == "json" {
        subscriber_builder.json().try_init()
    } else {
        subscriber_builder.try_init()
    };

    init_result.map_err(|e| ClickflowError::config(format!("Failed to init logging: {}", e)))?;

    Ok(guard)
}
