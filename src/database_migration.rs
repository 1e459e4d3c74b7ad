//! # 数据库迁移模块 (Database Migration Module)
//!
//! ## 业务说明
//! 负责创建码本管理所需的全部表，以及实体定义无法表达的复合唯一约束
//!
//! ## 唯一约束
//! - 有序集合: (父项, position) 唯一，保证同一父项下没有重复位置
//! - 码本内分区、分区内系统: (父项, 子项) 唯一
//! - 分区内信道: 只约束 (分区挂载, position)，同一信道历史上可以出现在多个分区
//!
//! ## 幂等性设计
//! - 所有语句使用 IF NOT EXISTS，可以在每次连接时安全重复执行
//!
//! ## 调用链路
//! ```text
//! SqliteOrmPersistenceService::new() → DatabaseMigration::migrate() → 建表 → 建索引
//! ```

use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema, Statement};

use crate::error::{AppError, AppResult};
use crate::models::entities::{
    channel, codeplug, codeplug_zone, system, system_talkgroup, talkgroup, zone, zone_channel,
    zone_system, zone_system_talkgroup,
};

/// 复合唯一索引 (索引名, 表名, 列)
const UNIQUE_INDEXES: &[(&str, &str, &str)] = &[
    ("ux_codeplug_zones_position", "codeplug_zones", "codeplug_id, position"),
    ("ux_codeplug_zones_zone", "codeplug_zones", "codeplug_id, zone_id"),
    ("ux_zone_systems_position", "zone_systems", "zone_id, position"),
    ("ux_zone_systems_system", "zone_systems", "zone_id, system_id"),
    ("ux_zone_system_talkgroups_assignment", "zone_system_talkgroups", "zone_system_id, system_talkgroup_id"),
    ("ux_system_talkgroups_talkgroup", "system_talkgroups", "system_id, talkgroup_id"),
    ("ux_zone_channels_position", "zone_channels", "codeplug_zone_id, position"),
];

/// 普通查询索引 (索引名, 表名, 列)
const LOOKUP_INDEXES: &[(&str, &str, &str)] = &[
    ("ix_channels_codeplug", "channels", "codeplug_id"),
    ("ix_zone_channels_channel", "zone_channels", "channel_id"),
];

/// 数据库迁移管理器
///
/// 纯工具类，没有实例字段，所有方法都是关联函数
pub struct DatabaseMigration;

impl DatabaseMigration {
    /// 执行全部迁移步骤
    pub async fn migrate(db: &DatabaseConnection) -> AppResult<()> {
        log::info!("开始执行数据库迁移");

        Self::create_tables(db).await?;
        Self::create_indexes(db).await?;

        log::info!("数据库迁移完成");
        Ok(())
    }

    /// 按实体定义创建表（已存在则跳过）
    async fn create_tables(db: &DatabaseConnection) -> AppResult<()> {
        // 父表在前，便于在强制外键的后端上建表
        Self::create_table(db, codeplug::Entity).await?;
        Self::create_table(db, zone::Entity).await?;
        Self::create_table(db, system::Entity).await?;
        Self::create_table(db, talkgroup::Entity).await?;
        Self::create_table(db, system_talkgroup::Entity).await?;
        Self::create_table(db, codeplug_zone::Entity).await?;
        Self::create_table(db, zone_system::Entity).await?;
        Self::create_table(db, zone_system_talkgroup::Entity).await?;
        Self::create_table(db, channel::Entity).await?;
        Self::create_table(db, zone_channel::Entity).await?;
        Ok(())
    }

    async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> AppResult<()> {
        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        let stmt = schema.create_table_from_entity(entity).if_not_exists().to_owned();
        db.execute(backend.build(&stmt))
            .await
            .map_err(|e| AppError::persistence_error(format!("创建 {} 表失败: {}", entity.table_name(), e)))?;
        log::debug!("表 {} 已就绪", entity.table_name());
        Ok(())
    }

    /// 创建复合唯一索引和查询索引
    async fn create_indexes(db: &DatabaseConnection) -> AppResult<()> {
        let backend = db.get_database_backend();

        for (name, table, columns) in UNIQUE_INDEXES {
            let sql = format!("CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})", name, table, columns);
            db.execute(Statement::from_string(backend, sql))
                .await
                .map_err(|e| AppError::persistence_error(format!("创建唯一索引 {} 失败: {}", name, e)))?;
        }

        for (name, table, columns) in LOOKUP_INDEXES {
            let sql = format!("CREATE INDEX IF NOT EXISTS {} ON {} ({})", name, table, columns);
            db.execute(Statement::from_string(backend, sql))
                .await
                .map_err(|e| AppError::persistence_error(format!("创建索引 {} 失败: {}", name, e)))?;
        }

        Ok(())
    }

    /// 检查表是否存在（SQLite）
    pub async fn check_table_exists(db: &DatabaseConnection, table_name: &str) -> AppResult<bool> {
        let rows = db
            .query_all(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Sqlite,
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table_name.into()],
            ))
            .await
            .map_err(|e| AppError::persistence_error(format!("检查表 {} 是否存在失败: {}", table_name, e)))?;
        Ok(!rows.is_empty())
    }
}
