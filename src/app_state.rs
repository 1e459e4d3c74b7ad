//! 应用状态
//!
//! 按配置连接数据库、执行迁移并组装服务，调用方（命令行或上层宿主）持有一个 AppState

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::application::CodeplugService;
use crate::services::infrastructure::SqliteOrmPersistenceService;
use crate::services::traits::{BaseService, PersistenceService};
use crate::utils::config::AppConfig;
use crate::utils::error::AppResult;

/// 应用状态，包含所有服务的实例
pub struct AppState {
    pub config: AppConfig,
    pub persistence_service: Arc<dyn PersistenceService>,
    pub codeplug_service: Arc<CodeplugService>,
}

/// 系统状态信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub system_health: String,
    pub database_url: String,
    pub version: String,
}

impl AppState {
    /// 创建新的应用状态
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let mut persistence = SqliteOrmPersistenceService::new(&config.persistence_config).await?;
        persistence.initialize().await?;

        let mut codeplug_service =
            CodeplugService::new(persistence.connection(), config.ordering_config.clone());
        codeplug_service.initialize().await?;

        Ok(Self {
            config,
            persistence_service: Arc::new(persistence),
            codeplug_service: Arc::new(codeplug_service),
        })
    }

    /// 汇总各服务的健康状态
    pub async fn system_status(&self) -> SystemStatus {
        let persistence_ok = self.persistence_service.health_check().await;
        let codeplug_ok = self.codeplug_service.health_check().await;
        let system_health = match (persistence_ok, codeplug_ok) {
            (Ok(()), Ok(())) => "healthy".to_string(),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("健康检查失败: {}", e);
                format!("unhealthy: {}", e)
            }
        };
        SystemStatus {
            system_health,
            database_url: self.config.persistence_config.database_url.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// 初始化应用状态
pub async fn init_app_state(config: AppConfig) -> AppResult<AppState> {
    AppState::new(config).await
}
