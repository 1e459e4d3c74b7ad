// 文件: src/services/infrastructure/persistence/sqlite_orm_persistence_service.rs
// 使用SeaORM和SQLite实现配置图的持久化服务

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;

use crate::database_migration::DatabaseMigration;
use crate::models::entities::{
    channel, codeplug, codeplug_zone, system, system_talkgroup, talkgroup, zone, zone_channel,
};
use crate::models::enums::{SystemMode, ToneMode, TransmitPermission};
use crate::models::structs::{default_id, ChannelView, ModeDetail};
use crate::services::traits::{BaseService, PersistenceService};
use crate::utils::config::PersistenceConfig;
use crate::utils::error::{AppError, AppResult};

/// 基于SeaORM和SQLite的持久化服务实现
pub struct SqliteOrmPersistenceService {
    db_conn: Arc<DatabaseConnection>, // 使用Arc以便与应用层服务共享连接
    database_url: String,
}

impl SqliteOrmPersistenceService {
    /// 连接数据库并执行迁移
    pub async fn new(config: &PersistenceConfig) -> AppResult<Self> {
        let mut options = ConnectOptions::new(config.database_url.clone());
        options
            .max_connections(config.max_connections)
            .sqlx_logging(config.sqlx_logging);

        // 连接到数据库，文件不存在时由 sqlx 按 URL 中的 mode=rwc 创建
        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::persistence_error(format!("连接数据库 {} 失败: {}", config.database_url, e)))?;

        DatabaseMigration::migrate(&conn).await?;

        log::info!("持久化服务已连接: {}", config.database_url);
        Ok(Self {
            db_conn: Arc::new(conn),
            database_url: config.database_url.clone(),
        })
    }

    /// 共享的数据库连接，供应用层服务开启事务
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.db_conn.clone()
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    async fn require_system(&self, system_id: &str) -> AppResult<system::Model> {
        system::Entity::find_by_id(system_id.to_string())
            .one(self.db_conn.as_ref())
            .await
            .map_err(|e| AppError::from_db("加载系统失败", e))?
            .ok_or_else(|| AppError::not_found_error("System", format!("未找到ID为 {} 的系统", system_id)))
    }
}

#[async_trait]
impl BaseService for SqliteOrmPersistenceService {
    fn service_name(&self) -> &'static str {
        "SqliteOrmPersistenceService"
    }

    async fn initialize(&mut self) -> AppResult<()> {
        // 连接和迁移已在 new 中完成
        log::info!("{} 已初始化。", self.service_name());
        Ok(())
    }

    async fn shutdown(&mut self) -> AppResult<()> {
        // DatabaseConnection 在 Drop 时自动关闭
        log::info!("{} 已关闭。", self.service_name());
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        self.db_conn.ping().await.map_err(|db_err| {
            AppError::persistence_error(format!("数据库健康检查失败: {}", db_err))
        })?;
        log::debug!("数据库连接健康。");
        Ok(())
    }
}

#[async_trait]
impl PersistenceService for SqliteOrmPersistenceService {
    // --- 码本 ---
    async fn create_codeplug(&self, name: &str, owner_id: &str) -> AppResult<codeplug::Model> {
        codeplug::ActiveModel {
            id: Set(default_id()),
            name: Set(name.to_string()),
            owner_id: Set(owner_id.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db_conn.as_ref())
        .await
        .map_err(|e| AppError::from_db("创建码本失败", e))
    }

    async fn load_codeplug(&self, codeplug_id: &str) -> AppResult<Option<codeplug::Model>> {
        codeplug::Entity::find_by_id(codeplug_id.to_string())
            .one(self.db_conn.as_ref())
            .await
            .map_err(|e| AppError::from_db("加载码本失败", e))
    }

    // --- 分区 ---
    async fn create_zone(&self, name: &str, owner_id: &str, is_public: bool) -> AppResult<zone::Model> {
        zone::ActiveModel {
            id: Set(default_id()),
            name: Set(name.to_string()),
            owner_id: Set(owner_id.to_string()),
            is_public: Set(is_public),
            created_at: Set(Utc::now()),
        }
        .insert(self.db_conn.as_ref())
        .await
        .map_err(|e| AppError::from_db("创建分区失败", e))
    }

    // --- 系统与通话组 ---
    async fn create_system(&self, name: &str, owner_id: &str, mode: ModeDetail) -> AppResult<system::Model> {
        mode.validate()?;
        let (mode_column, color_code, nac, ran) = mode.to_columns();
        let model = system::ActiveModel {
            id: Set(default_id()),
            name: Set(name.to_string()),
            owner_id: Set(owner_id.to_string()),
            mode: Set(mode_column),
            color_code: Set(color_code),
            nac: Set(nac),
            ran: Set(ran),
            created_at: Set(Utc::now()),
        }
        .insert(self.db_conn.as_ref())
        .await
        .map_err(|e| AppError::from_db("创建系统失败", e))?;
        log::debug!("创建系统 {} ({})", model.name, mode);
        Ok(model)
    }

    async fn create_talkgroup(&self, name: &str, number: i64) -> AppResult<talkgroup::Model> {
        talkgroup::ActiveModel {
            id: Set(default_id()),
            name: Set(name.to_string()),
            number: Set(number),
            created_at: Set(Utc::now()),
        }
        .insert(self.db_conn.as_ref())
        .await
        .map_err(|e| AppError::from_db("创建通话组失败", e))
    }

    async fn create_system_talkgroup(
        &self,
        system_id: &str,
        talkgroup_id: &str,
        timeslot: Option<i32>,
    ) -> AppResult<system_talkgroup::Model> {
        let system = self.require_system(system_id).await?;
        let mode = system.mode_detail()?.mode();
        if !mode.is_digital() {
            return Err(AppError::validation_error(format!("模拟系统 {} 不能配置通话组", system.name)));
        }
        match timeslot {
            Some(slot) if mode != SystemMode::Dmr => {
                return Err(AppError::validation_error(format!("只有DMR系统可以指定时隙，收到 {}", slot)));
            }
            Some(slot) if !(1..=2).contains(&slot) => {
                return Err(AppError::validation_error(format!("DMR时隙必须为1或2: {}", slot)));
            }
            _ => {}
        }

        talkgroup::Entity::find_by_id(talkgroup_id.to_string())
            .one(self.db_conn.as_ref())
            .await
            .map_err(|e| AppError::from_db("加载通话组失败", e))?
            .ok_or_else(|| AppError::not_found_error("Talkgroup", format!("未找到ID为 {} 的通话组", talkgroup_id)))?;

        system_talkgroup::ActiveModel {
            id: Set(default_id()),
            system_id: Set(system.id.clone()),
            talkgroup_id: Set(talkgroup_id.to_string()),
            timeslot: Set(timeslot),
        }
        .insert(self.db_conn.as_ref())
        .await
        .map_err(|e| AppError::from_db("创建系统通话组配置失败", e))
    }

    // --- 生成产物 ---
    async fn list_codeplug_channels(&self, codeplug_id: &str) -> AppResult<Vec<ChannelView>> {
        let zone_placements = codeplug_zone::Entity::find()
            .filter(codeplug_zone::Column::CodeplugId.eq(codeplug_id))
            .order_by_asc(codeplug_zone::Column::Position)
            .all(self.db_conn.as_ref())
            .await
            .map_err(|e| AppError::from_db("加载分区挂载失败", e))?;

        let mut views = Vec::new();
        for zone_placement in zone_placements {
            let rows = zone_channel::Entity::find()
                .filter(zone_channel::Column::CodeplugZoneId.eq(zone_placement.id.as_str()))
                .order_by_asc(zone_channel::Column::Position)
                .find_also_related(channel::Entity)
                .all(self.db_conn.as_ref())
                .await
                .map_err(|e| AppError::from_db("加载信道挂载失败", e))?;

            for (placement, channel) in rows {
                let channel = channel.ok_or_else(|| {
                    AppError::not_found_error("Channel", format!("信道挂载 {} 引用的信道 {} 不存在", placement.id, placement.channel_id))
                })?;
                views.push(ChannelView {
                    channel_id: channel.id,
                    codeplug_zone_id: placement.codeplug_zone_id,
                    zone_id: placement.zone_id,
                    position: placement.position,
                    system_id: channel.system_id,
                    system_talkgroup_id: channel.system_talkgroup_id,
                    name: channel.name,
                    long_name: channel.long_name,
                    short_name: channel.short_name,
                    tone_mode: channel.tone_mode.parse::<ToneMode>().map_err(AppError::validation_error)?,
                    transmit_permission: channel
                        .transmit_permission
                        .parse::<TransmitPermission>()
                        .map_err(AppError::validation_error)?,
                });
            }
        }
        Ok(views)
    }

    async fn count_channels(&self, codeplug_id: &str) -> AppResult<u64> {
        channel::Entity::find()
            .filter(channel::Column::CodeplugId.eq(codeplug_id))
            .count(self.db_conn.as_ref())
            .await
            .map_err(|e| AppError::from_db("统计信道失败", e))
    }
}
