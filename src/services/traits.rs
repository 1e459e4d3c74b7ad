/// 服务层基础trait定义
/// 提供各层服务的接口规范，支持依赖注入和测试

use async_trait::async_trait;
use std::collections::HashMap;

use crate::models::entities::{codeplug, system, system_talkgroup, talkgroup, zone, zone_system_talkgroup};
use crate::models::enums::CollectionKind;
use crate::models::structs::*;
use crate::utils::error::AppResult;

/// 基础服务trait，所有服务都应实现
#[async_trait]
pub trait BaseService: Send + Sync {
    /// 服务名称
    fn service_name(&self) -> &'static str;

    /// 初始化服务
    async fn initialize(&mut self) -> AppResult<()>;

    /// 关闭服务
    async fn shutdown(&mut self) -> AppResult<()>;

    /// 健康检查
    async fn health_check(&self) -> AppResult<()>;
}

/// 配置图持久化服务trait
///
/// 只提供生成和排序所需的最小增删查，不含任何排序算法
#[async_trait]
pub trait PersistenceService: BaseService {
    /// 创建码本
    async fn create_codeplug(&self, name: &str, owner_id: &str) -> AppResult<codeplug::Model>;

    /// 加载码本
    async fn load_codeplug(&self, codeplug_id: &str) -> AppResult<Option<codeplug::Model>>;

    /// 创建分区
    async fn create_zone(&self, name: &str, owner_id: &str, is_public: bool) -> AppResult<zone::Model>;

    /// 创建系统（模式详情先校验再写入）
    async fn create_system(&self, name: &str, owner_id: &str, mode: ModeDetail) -> AppResult<system::Model>;

    /// 创建网络通话组
    async fn create_talkgroup(&self, name: &str, number: i64) -> AppResult<talkgroup::Model>;

    /// 为系统创建通话组配置
    async fn create_system_talkgroup(
        &self,
        system_id: &str,
        talkgroup_id: &str,
        timeslot: Option<i32>,
    ) -> AppResult<system_talkgroup::Model>;

    /// 按分区挂载顺序、分区内位置顺序列出码本的已生成信道
    async fn list_codeplug_channels(&self, codeplug_id: &str) -> AppResult<Vec<ChannelView>>;

    /// 统计码本的信道数量
    async fn count_channels(&self, codeplug_id: &str) -> AppResult<u64>;
}

/// 信道生成服务trait
#[async_trait]
pub trait IChannelGenerationService: BaseService {
    /// 生成码本的信道；已有信道且 regenerate 为 false 时返回 skipped
    async fn generate_channels(&self, codeplug_id: &str, regenerate: bool) -> AppResult<GenerationSummary>;
}

/// 有序集合服务trait
///
/// 三种有序集合共用同一套操作，parent_id 的含义由 kind 决定:
/// 码本ID、分区ID 或 分区挂载记录ID
#[async_trait]
pub trait IOrderedCollectionService: BaseService {
    /// 追加到末尾，返回新挂载记录
    async fn append(&self, kind: CollectionKind, parent_id: &str, child_id: &str) -> AppResult<Placement>;

    /// 删除并压缩后续位置，返回被删除的挂载记录
    async fn remove(&self, kind: CollectionKind, parent_id: &str, child_id: &str) -> AppResult<Placement>;

    /// 按 子项ID → 目标位置 重排，返回重排后的完整列表
    async fn reorder(
        &self,
        kind: CollectionKind,
        parent_id: &str,
        desired: &HashMap<String, i32>,
    ) -> AppResult<Vec<Placement>>;

    /// 按位置升序列出
    async fn list(&self, kind: CollectionKind, parent_id: &str) -> AppResult<Vec<Placement>>;

    /// 检查位置是否恰好为 1..N
    async fn verify_contiguity(&self, kind: CollectionKind, parent_id: &str) -> AppResult<ContiguityReport>;
}

/// 通话组分配服务trait
#[async_trait]
pub trait ITalkgroupAssignmentService: BaseService {
    /// 为系统挂载分配通话组配置
    async fn assign_talkgroup(
        &self,
        zone_system_id: &str,
        system_talkgroup_id: &str,
    ) -> AppResult<zone_system_talkgroup::Model>;

    /// 取消分配
    async fn unassign_talkgroup(&self, zone_system_id: &str, system_talkgroup_id: &str) -> AppResult<()>;
}
