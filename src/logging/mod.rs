//! # 日志记录模块 (Logging Module)
//!
//! ## 业务说明
//! 日志记录模块负责核心操作过程中的信息记录，包括信道生成、位置重排、
//! 事务冲突重试等，为故障排查和审计追踪提供日志支持
//!
//! ## 日志策略
//! - **生成日志**: 记录每次信道生成的统计结果
//! - **排序日志**: 记录有序集合的追加、删除、重排
//! - **用户操作**: 记录调用方发起的写操作
//!
//! ## Rust知识点
//! - **日志宏**: 使用log crate的宏系统
//! - **环境配置**: 通过env_logger进行环境变量配置

pub mod logger_config;

pub use logger_config::*;

/// 记录用户操作日志
#[macro_export]
macro_rules! log_user_operation {
    ($msg:expr) => {
        log::info!("[用户操作] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::info!("[用户操作] {}", format!($msg, $($arg)*));
    };
}

/// 记录信道生成日志
#[macro_export]
macro_rules! log_generation_event {
    ($msg:expr) => {
        log::info!("[信道生成] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::info!("[信道生成] {}", format!($msg, $($arg)*));
    };
}

/// 记录有序集合位置维护日志
#[macro_export]
macro_rules! log_ordering_event {
    ($msg:expr) => {
        log::debug!("[位置维护] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::debug!("[位置维护] {}", format!($msg, $($arg)*));
    };
}
