use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序统一错误类型
/// 用于封装码本管理核心中可能出现的各种错误，提供统一的错误处理机制
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppError {
    /// 输入/输出错误
    #[error("IO错误: {message} (Kind: {kind})")]
    IoError { message: String, kind: String },

    /// 数据持久化相关错误
    #[error("持久化错误: {message}")]
    PersistenceError { message: String },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    ConfigurationError { message: String },

    /// 验证错误
    ///
    /// **业务含义**: 调用方提供的数据违反了结构性约束
    /// - 向有序集合追加已存在的子项
    /// - 重排请求不是合法的排列（重复、越界、位置小于1）
    /// - 跨系统的通话组分配
    ///
    /// 总是在受影响操作的任何写入之前检测到
    #[error("验证错误: {message}")]
    ValidationError { message: String },

    /// 资源未找到错误
    #[error("资源未找到: {resource_type} - {message}")]
    NotFoundError {
        resource_type: String,
        message: String,
    },

    /// 事务冲突错误
    ///
    /// **业务含义**: 并发修改在提交时触发了唯一性约束冲突
    /// （追加时读取最大位置与插入之间的竞争，或并发的重排/删除）
    ///
    /// **错误恢复**: 应用层在事务边界自动重试一次，
    /// 重试仍冲突则作为瞬时失败返回给调用方
    #[error("事务冲突: {message}")]
    ConflictError { message: String },

    /// JSON序列化/反序列化错误
    #[error("JSON序列化/反序列化错误: {message}")]
    JsonError { message: String },
}

impl AppError {
    /// 创建IO错误
    pub fn io_error(message: impl Into<String>, kind_str: impl Into<String>) -> Self {
        Self::IoError {
            message: message.into(),
            kind: kind_str.into(),
        }
    }

    /// 创建持久化错误
    pub fn persistence_error(message: impl Into<String>) -> Self {
        Self::PersistenceError {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found_error(resource_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFoundError {
            resource_type: resource_type.into(),
            message: message.into(),
        }
    }

    /// 创建事务冲突错误
    pub fn conflict_error(message: impl Into<String>) -> Self {
        Self::ConflictError {
            message: message.into(),
        }
    }

    /// 创建JSON序列化错误
    pub fn json_error(message: impl Into<String>) -> Self {
        Self::JsonError {
            message: message.into(),
        }
    }

    /// 将数据库错误包装为带上下文的应用错误
    ///
    /// 唯一性约束冲突和 SQLite 的 BUSY/LOCKED 统一视为事务冲突，其余视为持久化错误
    pub fn from_db(context: impl AsRef<str>, err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                Self::conflict_error(format!("{}: {}", context.as_ref(), detail))
            }
            _ if is_sqlite_busy(&err) => Self::conflict_error(format!("{}: {}", context.as_ref(), err)),
            _ => Self::persistence_error(format!("{}: {}", context.as_ref(), err)),
        }
    }

    /// 是否可以在事务边界自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConflictError { .. })
    }

    /// 获取错误的简短描述
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::IoError { .. } => "IO_ERROR",
            AppError::PersistenceError { .. } => "PERSISTENCE_ERROR",
            AppError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::NotFoundError { .. } => "NOT_FOUND_ERROR",
            AppError::ConflictError { .. } => "CONFLICT_ERROR",
            AppError::JsonError { .. } => "JSON_ERROR",
        }
    }
}

/// 标准 I/O 错误到 AppError 的转换
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError { message: err.to_string(), kind: format!("{:?}", err.kind()) }
    }
}

/// serde_json 错误到 AppError 的转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError { message: err.to_string() }
    }
}

/// SeaORM 错误到 AppError 的转换
///
/// 唯一性约束冲突映射为 ConflictError，便于应用层识别并重试
impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::from_db("数据库操作失败", err)
    }
}

/// config 错误到 AppError 的转换
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigurationError { message: err.to_string() }
    }
}

/// SQLite 主错误码: SQLITE_BUSY = 5, SQLITE_LOCKED = 6（扩展码的低 8 位）
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// 数据库是否因另一个写者持有锁而拒绝了本次操作
fn is_sqlite_busy(err: &DbErr) -> bool {
    let runtime_err = match err {
        DbErr::Conn(e) | DbErr::Exec(e) | DbErr::Query(e) => e,
        _ => return false,
    };
    match runtime_err {
        RuntimeErr::SqlxError(sqlx_err) => sqlx_err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    }
}

/// 应用程序结果类型别名
/// 简化错误处理的类型定义
pub type AppResult<T> = Result<T, AppError>;
