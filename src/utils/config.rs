use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::utils::error::{AppError, AppResult};

/// 环境变量前缀，例如 CODEPLUG_PERSISTENCE_CONFIG__DATABASE_URL
const ENV_PREFIX: &str = "CODEPLUG";

/// 应用程序主配置结构
/// 包含码本管理核心运行所需的所有配置信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 应用程序基本设置
    pub app_settings: AppSettings,
    /// 数据存储配置
    pub persistence_config: PersistenceConfig,
    /// 日志配置
    pub logging_config: LoggingConfig,
    /// 有序集合配置
    pub ordering_config: OrderingConfig,
}

/// 应用程序基本设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// 应用程序名称
    pub app_name: String,
    /// 运行环境 (development, testing, production)
    pub environment: String,
}

/// 数据持久化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// 数据库连接URL
    pub database_url: String,
    /// 连接池最大连接数
    pub max_connections: u32,
    /// 是否输出 sqlx 语句日志
    pub sqlx_logging: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别 (error, warn, info, debug, trace)
    pub log_level: String,
    /// 是否启用控制台输出
    pub console_output: bool,
    /// 是否在日志中显示模块路径
    pub show_module_path: bool,
}

/// 有序集合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    /// 两阶段重排时临时位置空间的偏移量
    pub temporary_position_offset: i32,
    /// 事务冲突时的自动重试次数
    pub conflict_retry_count: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: "CodeplugManager".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://codeplug_data.sqlite?mode=rwc".to_string(),
            max_connections: 1,
            sqlx_logging: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            console_output: true,
            show_module_path: false,
        }
    }
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            temporary_position_offset: 1000,
            conflict_retry_count: 1,
        }
    }
}

impl PersistenceConfig {
    /// 内存数据库配置，测试和临时会话使用
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            sqlx_logging: false,
        }
    }
}

/// 配置管理器
/// 负责加载、保存和管理应用程序配置
pub struct ConfigManager {
    config: AppConfig,
    config_file_path: PathBuf,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_file_path: PathBuf) -> Self {
        Self {
            config: AppConfig::default(),
            config_file_path,
        }
    }

    /// 分层加载配置：默认值 → JSON配置文件（可选） → 环境变量
    pub fn load(&mut self) -> AppResult<()> {
        let defaults = config::Config::try_from(&AppConfig::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(self.config_file_path.as_path())
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        self.config = settings.try_deserialize()?;
        Ok(())
    }

    /// 将配置保存到文件
    pub async fn save_to_file(&self) -> AppResult<()> {
        if let Some(parent) = self.config_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await
                    .map_err(|e| AppError::io_error(format!("创建配置目录失败: {}", e), e.kind().to_string()))?;
            }
        }

        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| AppError::json_error(format!("序列化配置失败: {}", e)))?;

        tokio::fs::write(&self.config_file_path, content)
            .await
            .map_err(|e| AppError::io_error(format!("写入配置文件失败: {}", e), e.kind().to_string()))?;

        Ok(())
    }

    /// 获取配置文件路径
    pub fn config_file_path(&self) -> &Path {
        &self.config_file_path
    }

    /// 获取配置的只读引用
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取配置的可变引用
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    /// 验证配置的有效性
    pub fn validate_config(&self) -> AppResult<()> {
        if self.config.persistence_config.database_url.trim().is_empty() {
            return Err(AppError::configuration_error("数据库连接URL不能为空"));
        }

        if self.config.persistence_config.max_connections == 0 {
            return Err(AppError::configuration_error("连接池最大连接数不能为0"));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.config.logging_config.log_level.as_str()) {
            return Err(AppError::configuration_error(format!(
                "无效的日志级别: {}，有效值: {:?}",
                self.config.logging_config.log_level, valid_log_levels
            )));
        }

        // 临时位置空间必须落在正整数区间，否则会与最终位置混淆
        if self.config.ordering_config.temporary_position_offset < 1 {
            return Err(AppError::configuration_error(format!(
                "临时位置偏移量必须大于0: {}",
                self.config.ordering_config.temporary_position_offset
            )));
        }

        Ok(())
    }

    /// 重置为默认配置
    pub fn reset_to_default(&mut self) {
        self.config = AppConfig::default();
    }
}

/// 按路径加载并验证配置
pub fn load_config(config_path: Option<PathBuf>) -> AppResult<AppConfig> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("config/codeplug_config.json"));
    let mut manager = ConfigManager::new(config_path);
    manager.load()?;
    manager.validate_config()?;
    Ok(manager.get_config().clone())
}
