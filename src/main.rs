use clap::Parser;
use tracing::error;

use clickflow::cli::{Cli, Commands, ConfigCommands};
use clickflow::config::StaticConfig;
use clickflow::runtime::modes;
use clickflow::system::init_logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 生成配置不需要加载现有配置，也不需要日志
    if let Some(Commands::Config {
        action: ConfigCommands::Generate { output_path, force },
    }) = &cli.command
    {
        if let Err(e) = modes::run_config_generate(output_path.clone(), *force) {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match StaticConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        None | Some(Commands::Worker) => modes::run_worker(config).await,
        #[cfg(feature = "server")]
        Some(Commands::Serve) => modes::run_server(config).await,
        Some(Commands::Enqueue {
            url_id,
            ip,
            user_agent,
            referrer,
            timestamp,
        }) => modes::run_enqueue(&config, url_id, ip, user_agent, referrer, timestamp).await,
        Some(Commands::QueueStatus) => modes::run_queue_status(&config).await,
        Some(Commands::Config { .. }) => Ok(()),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
