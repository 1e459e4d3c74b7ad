// 码本管理命令行入口

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use codeplug_lib::logging::init_logger;
use codeplug_lib::utils::load_config;
use codeplug_lib::{init_app_state, AppResult, IChannelGenerationService};

/// 码本信道生成与维护工具
#[derive(Debug, Parser)]
#[command(name = "codeplug-manager", version)]
struct Cli {
    /// 配置文件路径（JSON），缺省为 config/codeplug_config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 创建或升级数据库结构
    Migrate,
    /// 为码本生成信道
    Generate {
        /// 码本ID
        codeplug_id: String,
        /// 已有信道时删除后重新生成
        #[arg(long)]
        regenerate: bool,
    },
    /// 输出系统状态
    Status,
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = load_config(cli.config)?;
    init_logger(&config.logging_config);

    // 连接时自动执行迁移
    let state = init_app_state(config).await?;

    match cli.command {
        Command::Migrate => {
            log::info!("数据库迁移完成: {}", state.config.persistence_config.database_url);
        }
        Command::Generate { codeplug_id, regenerate } => {
            let summary = state
                .codeplug_service
                .generate_channels(&codeplug_id, regenerate)
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Status => {
            let status = state.system_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[{}] {}", e.error_code(), e);
            ExitCode::FAILURE
        }
    }
}
