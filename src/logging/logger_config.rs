//! 日志配置模块
//!
//! 基于 env_logger 初始化全局日志。控制台输出开启时 RUST_LOG 环境变量优先于配置文件的级别，
//! 关闭时忽略 RUST_LOG

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

use crate::utils::config::LoggingConfig;

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("未知的日志级别: {}", other)),
        }
    }
}

/// 初始化全局日志
///
/// 重复调用是安全的：已初始化时返回 false
pub fn init_logger(config: &LoggingConfig) -> bool {
    let env_filters = std::env::var("RUST_LOG").ok();
    build_logger(config, env_filters.as_deref()).try_init().is_ok()
}

/// 按配置构造 env_logger，`env_filters` 为 RUST_LOG 的内容
fn build_logger(config: &LoggingConfig, env_filters: Option<&str>) -> env_logger::Builder {
    let level: LevelFilter = config
        .log_level
        .parse::<LogLevel>()
        .map(Into::into)
        .unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    if config.console_output {
        builder.filter_level(level);
        if let Some(filters) = env_filters {
            builder.parse_filters(filters);
        }
    } else {
        builder.filter_level(LevelFilter::Off);
    }

    let show_module_path = config.show_module_path;
    builder.format(move |buf, record| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if show_module_path {
            writeln!(
                buf,
                "[{}] [{}] [{}] {}",
                timestamp,
                record.level(),
                record.module_path().unwrap_or("-"),
                record.args()
            )
        } else {
            writeln!(buf, "[{}] [{}] {}", timestamp, record.level(), record.args())
        }
    });

    builder
}
