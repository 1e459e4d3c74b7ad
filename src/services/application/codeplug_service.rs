/// 码本服务
///
/// 应用层门面，负责：
/// 1. 为每个操作划定事务边界（begin → 领域操作 → commit，失败时随事务丢弃回滚）
/// 2. 按种类把有序集合操作分派到对应的挂载表
/// 3. 唯一性冲突时整体重试，重试次数由 OrderingConfig 决定

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait,
    IsolationLevel, QueryFilter, TransactionTrait,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::models::entities::{codeplug_zone, zone_channel, zone_system, zone_system_talkgroup};
use crate::models::enums::CollectionKind;
use crate::models::structs::{ContiguityReport, GenerationSummary, Placement};
use crate::services::domain::{
    assign_talkgroup, unassign_talkgroup, ChannelGenerator, OrderedCollection,
};
use crate::services::traits::{
    BaseService, IChannelGenerationService, IOrderedCollectionService, ITalkgroupAssignmentService,
};
use crate::utils::config::OrderingConfig;
use crate::utils::error::{AppError, AppResult};
use crate::{log_generation_event, log_user_operation};

/// 码本服务实现
pub struct CodeplugService {
    /// 共享数据库连接
    db: Arc<DatabaseConnection>,
    /// 排序与重试配置
    ordering_config: OrderingConfig,
    generator: ChannelGenerator,
}

impl CodeplugService {
    /// 创建新的码本服务
    pub fn new(db: Arc<DatabaseConnection>, ordering_config: OrderingConfig) -> Self {
        Self {
            db,
            ordering_config,
            generator: ChannelGenerator::new(),
        }
    }

    pub fn ordering_config(&self) -> &OrderingConfig {
        &self.ordering_config
    }

    /// 开启事务
    ///
    /// 信道生成在非 SQLite 后端使用 RepeatableRead，SQLite 依靠单写者锁
    async fn begin(&self, repeatable_read: bool) -> AppResult<DatabaseTransaction> {
        let isolation_level = match self.db.get_database_backend() {
            DbBackend::Sqlite => None,
            _ if repeatable_read => Some(IsolationLevel::RepeatableRead),
            _ => None,
        };
        self.db
            .begin_with_config(isolation_level, None)
            .await
            .map_err(|e| AppError::from_db("开启事务失败", e))
    }

    async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
        txn.commit().await.map_err(|e| AppError::from_db("提交事务失败", e))
    }

    /// 冲突时整体重试
    ///
    /// 每次尝试都是一个完整的新事务；只有 ConflictError 会触发重试，
    /// 重试次数耗尽后原样返回最后一次的错误
    pub async fn run_with_retry<T, F, Fut>(&self, operation: &str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
        T: Send,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.ordering_config.conflict_retry_count => {
                    retries += 1;
                    log::warn!("{} 发生冲突，第 {} 次重试: {}", operation, retries, err);
                }
                result => return result,
            }
        }
    }

    fn offset(&self) -> i32 {
        self.ordering_config.temporary_position_offset
    }

    async fn generate_once(&self, codeplug_id: &str, regenerate: bool) -> AppResult<GenerationSummary> {
        let txn = self.begin(true).await?;
        let summary = self.generator.generate(&txn, codeplug_id, regenerate).await?;
        Self::commit(txn).await?;
        Ok(summary)
    }

    async fn append_once(&self, kind: CollectionKind, parent_id: &str, child_id: &str) -> AppResult<Placement> {
        let txn = self.begin(false).await?;
        let placement = match kind {
            CollectionKind::CodeplugZones => {
                OrderedCollection::<codeplug_zone::Entity>::new(self.offset())
                    .append(&txn, parent_id, child_id)
                    .await?
            }
            CollectionKind::ZoneSystems => {
                OrderedCollection::<zone_system::Entity>::new(self.offset())
                    .append(&txn, parent_id, child_id)
                    .await?
            }
            CollectionKind::ZoneChannels => {
                OrderedCollection::<zone_channel::Entity>::new(self.offset())
                    .append(&txn, parent_id, child_id)
                    .await?
            }
        };
        Self::commit(txn).await?;
        Ok(placement)
    }

    async fn remove_once(&self, kind: CollectionKind, parent_id: &str, child_id: &str) -> AppResult<Placement> {
        let txn = self.begin(false).await?;
        let placement = match kind {
            CollectionKind::CodeplugZones => {
                let removed = OrderedCollection::<codeplug_zone::Entity>::new(self.offset())
                    .remove(&txn, parent_id, child_id)
                    .await?;
                // 分区挂载的信道挂载随之删除
                let dropped = zone_channel::Entity::delete_many()
                    .filter(zone_channel::Column::CodeplugZoneId.eq(removed.id.as_str()))
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::from_db("删除分区挂载的信道挂载失败", e))?;
                log::debug!("分区挂载 {} 删除，清理信道挂载 {} 条", removed.id, dropped.rows_affected);
                removed
            }
            CollectionKind::ZoneSystems => {
                let removed = OrderedCollection::<zone_system::Entity>::new(self.offset())
                    .remove(&txn, parent_id, child_id)
                    .await?;
                zone_system_talkgroup::Entity::delete_many()
                    .filter(zone_system_talkgroup::Column::ZoneSystemId.eq(removed.id.as_str()))
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::from_db("删除系统挂载的通话组分配失败", e))?;
                removed
            }
            CollectionKind::ZoneChannels => {
                OrderedCollection::<zone_channel::Entity>::new(self.offset())
                    .remove(&txn, parent_id, child_id)
                    .await?
            }
        };
        Self::commit(txn).await?;
        Ok(placement)
    }

    async fn reorder_once(
        &self,
        kind: CollectionKind,
        parent_id: &str,
        desired: &HashMap<String, i32>,
    ) -> AppResult<Vec<Placement>> {
        let txn = self.begin(false).await?;
        let placements = match kind {
            CollectionKind::CodeplugZones => {
                OrderedCollection::<codeplug_zone::Entity>::new(self.offset())
                    .reorder(&txn, parent_id, desired)
                    .await?
            }
            CollectionKind::ZoneSystems => {
                OrderedCollection::<zone_system::Entity>::new(self.offset())
                    .reorder(&txn, parent_id, desired)
                    .await?
            }
            CollectionKind::ZoneChannels => {
                OrderedCollection::<zone_channel::Entity>::new(self.offset())
                    .reorder(&txn, parent_id, desired)
                    .await?
            }
        };
        Self::commit(txn).await?;
        Ok(placements)
    }
}

#[async_trait]
impl BaseService for CodeplugService {
    fn service_name(&self) -> &'static str {
        "CodeplugService"
    }

    async fn initialize(&mut self) -> AppResult<()> {
        log::info!(
            "{} 已初始化，临时位置偏移 {}，冲突重试 {} 次",
            self.service_name(),
            self.ordering_config.temporary_position_offset,
            self.ordering_config.conflict_retry_count
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> AppResult<()> {
        log::info!("{} 已关闭。", self.service_name());
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        self.db
            .ping()
            .await
            .map_err(|e| AppError::persistence_error(format!("数据库健康检查失败: {}", e)))
    }
}

#[async_trait]
impl IChannelGenerationService for CodeplugService {
    async fn generate_channels(&self, codeplug_id: &str, regenerate: bool) -> AppResult<GenerationSummary> {
        log_user_operation!("请求生成码本 {} 的信道 (regenerate={})", codeplug_id, regenerate);
        let summary = self
            .run_with_retry("生成信道", move || self.generate_once(codeplug_id, regenerate))
            .await?;
        if summary.skipped {
            log_generation_event!("码本 {} 未生成: 已有信道", codeplug_id);
        }
        Ok(summary)
    }
}

#[async_trait]
impl IOrderedCollectionService for CodeplugService {
    async fn append(&self, kind: CollectionKind, parent_id: &str, child_id: &str) -> AppResult<Placement> {
        self.run_with_retry("追加", move || self.append_once(kind, parent_id, child_id))
            .await
    }

    async fn remove(&self, kind: CollectionKind, parent_id: &str, child_id: &str) -> AppResult<Placement> {
        let removed = self
            .run_with_retry("删除", move || self.remove_once(kind, parent_id, child_id))
            .await?;
        log_user_operation!("从 {} {} 中删除 {}", kind, parent_id, child_id);
        Ok(removed)
    }

    async fn reorder(
        &self,
        kind: CollectionKind,
        parent_id: &str,
        desired: &HashMap<String, i32>,
    ) -> AppResult<Vec<Placement>> {
        self.run_with_retry("重排", move || self.reorder_once(kind, parent_id, desired))
            .await
    }

    async fn list(&self, kind: CollectionKind, parent_id: &str) -> AppResult<Vec<Placement>> {
        let db = self.db.as_ref();
        match kind {
            CollectionKind::CodeplugZones => {
                OrderedCollection::<codeplug_zone::Entity>::new(self.offset()).list(db, parent_id).await
            }
            CollectionKind::ZoneSystems => {
                OrderedCollection::<zone_system::Entity>::new(self.offset()).list(db, parent_id).await
            }
            CollectionKind::ZoneChannels => {
                OrderedCollection::<zone_channel::Entity>::new(self.offset()).list(db, parent_id).await
            }
        }
    }

    async fn verify_contiguity(&self, kind: CollectionKind, parent_id: &str) -> AppResult<ContiguityReport> {
        let db = self.db.as_ref();
        let report = match kind {
            CollectionKind::CodeplugZones => {
                OrderedCollection::<codeplug_zone::Entity>::new(self.offset())
                    .verify_contiguity(db, parent_id)
                    .await?
            }
            CollectionKind::ZoneSystems => {
                OrderedCollection::<zone_system::Entity>::new(self.offset())
                    .verify_contiguity(db, parent_id)
                    .await?
            }
            CollectionKind::ZoneChannels => {
                OrderedCollection::<zone_channel::Entity>::new(self.offset())
                    .verify_contiguity(db, parent_id)
                    .await?
            }
        };
        if !report.is_contiguous {
            log::warn!("{} {} 的位置不连续: {:?}", kind, parent_id, report.positions);
        }
        Ok(report)
    }
}

#[async_trait]
impl ITalkgroupAssignmentService for CodeplugService {
    async fn assign_talkgroup(
        &self,
        zone_system_id: &str,
        system_talkgroup_id: &str,
    ) -> AppResult<zone_system_talkgroup::Model> {
        self.run_with_retry("分配通话组", move || async move {
            let txn = self.begin(false).await?;
            let assignment = assign_talkgroup(&txn, zone_system_id, system_talkgroup_id).await?;
            Self::commit(txn).await?;
            Ok(assignment)
        })
        .await
    }

    async fn unassign_talkgroup(&self, zone_system_id: &str, system_talkgroup_id: &str) -> AppResult<()> {
        self.run_with_retry("取消通话组分配", move || async move {
            let txn = self.begin(false).await?;
            unassign_talkgroup(&txn, zone_system_id, system_talkgroup_id).await?;
            Self::commit(txn).await
        })
        .await
    }
}
