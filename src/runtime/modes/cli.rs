//! One-shot commands: enqueue, queue status, config generation

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::analytics::{ClickEvent, parse_timestamp};
use crate::config::StaticConfig;
use crate::queue;

/// 手动入队一个点击事件
pub async fn run_enqueue(
    config: &StaticConfig,
    url_id: String,
    ip: String,
    user_agent: Option<String>,
    referrer: Option<String>,
    timestamp: Option<String>,
) -> Result<()> {
    let mut event = ClickEvent::new(url_id, ip);
    event.user_agent = user_agent;
    event.referrer = referrer;
    if let Some(ts) = timestamp {
        event.occurred_at = parse_timestamp(&ts).map_err(anyhow::Error::msg)?;
    }

    config.require_shared_queue()?;
    let _ = rustls::crypto::ring::default_provider().install_default();
    let queue = queue::create_queue(config)
        .await
        .context("Failed to connect to queue")?;
    let job_id = queue.enqueue(event).await?;

    println!("{} {}", "Enqueued".green().bold(), job_id);
    Ok(())
}

/// 打印队列各状态的任务数
pub async fn run_queue_status(config: &StaticConfig) -> Result<()> {
    config.require_shared_queue()?;
    let _ = rustls::crypto::ring::default_provider().install_default();
    let queue = queue::create_queue(config)
        .await
        .context("Failed to connect to queue")?;
    let counts = queue.counts().await?;

    println!("{} {}", "Queue".bold(), queue.name().cyan());
    println!("  waiting: {}", counts.waiting);
    println!("  active:  {}", counts.active);
    println!("  delayed: {}", counts.delayed);
    println!("  failed:  {}", counts.failed.to_string().red());
    Ok(())
}

/// 生成示例配置
pub fn run_config_generate(output_path: Option<String>, force: bool) -> Result<()> {
    let Some(path) = output_path else {
        println!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    };

    if std::path::Path::new(&path).exists() && !force {
        bail!("{} already exists, use --force to overwrite", path);
    }

    StaticConfig::default().save_to_file(&path)?;
    println!("{} {}", "Configuration written to".green(), path);
    Ok(())
}
