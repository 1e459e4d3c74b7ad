//! # 信道生成领域服务 (Channel Generator)
//!
//! ## 业务说明
//! 把码本的配置图（有序分区 → 有序系统 → 通话组分配）展开成扁平、有序的信道列表：
//! - 分区挂载按 position 升序遍历，分区内系统挂载按 position 升序遍历
//! - 模拟系统: 生成 1 个信道，无通话组
//! - 数字系统 (DMR/P25/NXDN): 每个通话组分配生成 1 个信道；没有分配则不生成
//! - 每个信道挂载到生成它的分区，分区内位置从 1 开始连续编号
//!
//! ## 重新生成
//! 码本已有信道且未要求重新生成时不做任何写入，返回 skipped；
//! 要求重新生成时先删除全部旧信道及其挂载，再整体重建，不做增量比对
//!
//! ## 事务约定
//! 在调用方传入的事务上执行，任何一步失败都由调用方回滚，不存在部分生成

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::error::{AppError, AppResult};
use crate::log_generation_event;
use crate::models::entities::{
    channel, codeplug, codeplug_zone, system, system_talkgroup, talkgroup, zone_channel, zone_system,
    zone_system_talkgroup,
};
use crate::models::enums::{ToneMode, TransmitPermission};
use crate::models::structs::{default_id, GenerationSummary, ModeDetail};
use crate::services::domain::ordered_collection::acquire_sqlite_write_lock;

/// 短名称最大字符数
pub const SHORT_NAME_MAX_CHARS: usize = 8;

/// 去除空白并截断到 8 个字符（按字符计数，不会截断多字节字符）
pub fn derive_short_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .take(SHORT_NAME_MAX_CHARS)
        .collect()
}

/// 待写入的信道（展开规则的纯结果）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDraft {
    pub system_id: String,
    pub system_talkgroup_id: Option<String>,
    pub name: String,
    pub long_name: String,
    pub short_name: String,
}

/// 数字系统挂载上的一条通话组分配（已解析出通话组名称）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssignment {
    pub system_talkgroup_id: String,
    pub talkgroup_name: String,
}

/// 按系统模式展开一个系统挂载
///
/// 模拟系统忽略通话组分配；数字系统按传入顺序逐条展开
pub fn expand_system_placement(
    system: &system::Model,
    mode: &ModeDetail,
    assignments: &[ResolvedAssignment],
) -> Vec<ChannelDraft> {
    match mode {
        ModeDetail::Analog => vec![ChannelDraft {
            system_id: system.id.clone(),
            system_talkgroup_id: None,
            name: system.name.clone(),
            long_name: system.name.clone(),
            short_name: derive_short_name(&system.name),
        }],
        ModeDetail::Dmr { .. } | ModeDetail::P25 { .. } | ModeDetail::Nxdn { .. } => assignments
            .iter()
            .map(|assignment| ChannelDraft {
                system_id: system.id.clone(),
                system_talkgroup_id: Some(assignment.system_talkgroup_id.clone()),
                name: assignment.talkgroup_name.clone(),
                long_name: format!("{} - {}", system.name, assignment.talkgroup_name),
                short_name: derive_short_name(&assignment.talkgroup_name),
            })
            .collect(),
    }
}

/// 信道生成器
///
/// 调用之间无状态，唯一的持久状态就是它的产物
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelGenerator;

impl ChannelGenerator {
    pub fn new() -> Self {
        Self
    }

    /// 为码本生成信道与信道挂载
    pub async fn generate<C: ConnectionTrait>(
        &self,
        db: &C,
        codeplug_id: &str,
        regenerate: bool,
    ) -> AppResult<GenerationSummary> {
        acquire_sqlite_write_lock::<codeplug::Entity, C>(db, codeplug::Column::Id, codeplug::Column::Name, codeplug_id)
            .await?;

        let codeplug = codeplug::Entity::find_by_id(codeplug_id.to_string())
            .one(db)
            .await
            .map_err(|e| AppError::from_db("加载码本失败", e))?
            .ok_or_else(|| AppError::not_found_error("Codeplug", format!("未找到ID为 {} 的码本", codeplug_id)))?;

        let existing = channel::Entity::find()
            .filter(channel::Column::CodeplugId.eq(codeplug.id.as_str()))
            .count(db)
            .await
            .map_err(|e| AppError::from_db("统计已有信道失败", e))?;

        if existing > 0 && !regenerate {
            log_generation_event!("码本 {} 已有 {} 个信道且未要求重新生成，跳过", codeplug.id, existing);
            return Ok(GenerationSummary::skipped());
        }

        let mut summary = GenerationSummary::default();
        if existing > 0 {
            summary.channels_deleted = self.delete_existing_channels(db, &codeplug.id).await?;
        }

        let zone_placements = codeplug_zone::Entity::find()
            .filter(codeplug_zone::Column::CodeplugId.eq(codeplug.id.as_str()))
            .order_by_asc(codeplug_zone::Column::Position)
            .all(db)
            .await
            .map_err(|e| AppError::from_db("加载分区挂载失败", e))?;

        for zone_placement in &zone_placements {
            let drafts = self.expand_zone(db, zone_placement).await?;

            // 分区内的位置计数器，模拟与数字信道共用
            for (index, draft) in drafts.into_iter().enumerate() {
                let channel_id = self.insert_channel(db, &codeplug.id, draft).await?;
                summary.channels_created += 1;

                zone_channel::ActiveModel {
                    id: Set(default_id()),
                    codeplug_zone_id: Set(zone_placement.id.clone()),
                    codeplug_id: Set(codeplug.id.clone()),
                    zone_id: Set(zone_placement.zone_id.clone()),
                    channel_id: Set(channel_id),
                    position: Set(index as i32 + 1),
                }
                .insert(db)
                .await
                .map_err(|e| AppError::from_db("创建信道挂载失败", e))?;
                summary.channel_placements_created += 1;
            }

            summary.zones_processed += 1;
        }

        log_generation_event!(
            "码本 {} 生成完成: 信道 {}，挂载 {}，分区 {}，删除旧信道 {}",
            codeplug.id,
            summary.channels_created,
            summary.channel_placements_created,
            summary.zones_processed,
            summary.channels_deleted
        );
        Ok(summary)
    }

    /// 删除码本的全部信道及其挂载，返回删除的信道数量
    async fn delete_existing_channels<C: ConnectionTrait>(&self, db: &C, codeplug_id: &str) -> AppResult<u32> {
        let owned_channels = Query::select()
            .column(channel::Column::Id)
            .from(channel::Entity)
            .and_where(channel::Column::CodeplugId.eq(codeplug_id))
            .to_owned();

        zone_channel::Entity::delete_many()
            .filter(zone_channel::Column::ChannelId.in_subquery(owned_channels))
            .exec(db)
            .await
            .map_err(|e| AppError::from_db("删除旧信道挂载失败", e))?;

        let deleted = channel::Entity::delete_many()
            .filter(channel::Column::CodeplugId.eq(codeplug_id))
            .exec(db)
            .await
            .map_err(|e| AppError::from_db("删除旧信道失败", e))?;

        log::debug!("码本 {} 删除旧信道 {} 个", codeplug_id, deleted.rows_affected);
        Ok(deleted.rows_affected as u32)
    }

    /// 展开一个分区挂载下的全部系统挂载
    async fn expand_zone<C: ConnectionTrait>(
        &self,
        db: &C,
        zone_placement: &codeplug_zone::Model,
    ) -> AppResult<Vec<ChannelDraft>> {
        let system_placements = zone_system::Entity::find()
            .filter(zone_system::Column::ZoneId.eq(zone_placement.zone_id.as_str()))
            .order_by_asc(zone_system::Column::Position)
            .find_also_related(system::Entity)
            .all(db)
            .await
            .map_err(|e| AppError::from_db("加载系统挂载失败", e))?;

        let mut drafts = Vec::new();
        for (system_placement, system) in &system_placements {
            let system = system.as_ref().ok_or_else(|| {
                AppError::not_found_error("System", format!("系统挂载 {} 引用的系统 {} 不存在", system_placement.id, system_placement.system_id))
            })?;
            let mode = system.mode_detail()?;

            let assignments = if mode.mode().is_digital() {
                self.load_assignments(db, system_placement).await?
            } else {
                Vec::new()
            };

            drafts.extend(expand_system_placement(system, &mode, &assignments));
        }

        log::debug!(
            "分区 {} (位置 {}) 展开 {} 个系统挂载，得到 {} 个信道",
            zone_placement.zone_id,
            zone_placement.position,
            system_placements.len(),
            drafts.len()
        );
        Ok(drafts)
    }

    /// 加载系统挂载上的通话组分配，按分配创建顺序排列
    async fn load_assignments<C: ConnectionTrait>(
        &self,
        db: &C,
        system_placement: &zone_system::Model,
    ) -> AppResult<Vec<ResolvedAssignment>> {
        let rows = zone_system_talkgroup::Entity::find()
            .filter(zone_system_talkgroup::Column::ZoneSystemId.eq(system_placement.id.as_str()))
            .order_by_asc(zone_system_talkgroup::Column::CreatedAt)
            .order_by_asc(zone_system_talkgroup::Column::Id)
            .find_also_related(system_talkgroup::Entity)
            .all(db)
            .await
            .map_err(|e| AppError::from_db("加载通话组分配失败", e))?;

        let talkgroup_ids: Vec<String> = rows
            .iter()
            .filter_map(|(_, config)| config.as_ref().map(|c| c.talkgroup_id.clone()))
            .collect();
        let talkgroup_names: HashMap<String, String> = if talkgroup_ids.is_empty() {
            HashMap::new()
        } else {
            talkgroup::Entity::find()
                .filter(talkgroup::Column::Id.is_in(talkgroup_ids))
                .all(db)
                .await
                .map_err(|e| AppError::from_db("加载通话组失败", e))?
                .into_iter()
                .map(|t| (t.id, t.name))
                .collect()
        };

        let mut resolved = Vec::with_capacity(rows.len());
        for (assignment, config) in rows {
            let config = config.ok_or_else(|| {
                AppError::not_found_error("SystemTalkgroup", format!("分配 {} 引用的通话组配置不存在", assignment.id))
            })?;
            // 写入时已拒绝跨系统分配，这里再次确认配置图没有被破坏
            if config.system_id != system_placement.system_id {
                return Err(AppError::validation_error(format!(
                    "分配 {} 引用了系统 {} 的通话组配置，但挂载的系统是 {}",
                    assignment.id, config.system_id, system_placement.system_id
                )));
            }
            let talkgroup_name = talkgroup_names.get(&config.talkgroup_id).cloned().ok_or_else(|| {
                AppError::not_found_error("Talkgroup", format!("未找到ID为 {} 的通话组", config.talkgroup_id))
            })?;
            resolved.push(ResolvedAssignment {
                system_talkgroup_id: config.id,
                talkgroup_name,
            });
        }
        Ok(resolved)
    }

    async fn insert_channel<C: ConnectionTrait>(&self, db: &C, codeplug_id: &str, draft: ChannelDraft) -> AppResult<String> {
        let channel_id = default_id();
        channel::ActiveModel {
            id: Set(channel_id.clone()),
            codeplug_id: Set(codeplug_id.to_string()),
            system_id: Set(draft.system_id),
            system_talkgroup_id: Set(draft.system_talkgroup_id),
            name: Set(draft.name),
            long_name: Set(draft.long_name),
            short_name: Set(draft.short_name),
            tone_mode: Set(ToneMode::default().to_string()),
            transmit_permission: Set(TransmitPermission::default().to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(|e| AppError::from_db("创建信道失败", e))?;
        Ok(channel_id)
    }
}
