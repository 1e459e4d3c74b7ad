//! # 通话组分配 (Talkgroup Assignment)
//!
//! 系统挂载上的通话组分配是无序集合，只支持创建和删除。
//! 分配规则:
//! - 只有数字系统挂载可以分配通话组
//! - 通话组配置必须属于挂载的系统
//! - 同一配置在同一挂载上只能分配一次

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::error::{AppError, AppResult};
use crate::log_user_operation;
use crate::models::entities::{system, system_talkgroup, zone_system, zone_system_talkgroup};
use crate::models::structs::default_id;
use crate::services::domain::ordered_collection::acquire_sqlite_write_lock;

/// 为系统挂载分配一条通话组配置
pub async fn assign_talkgroup<C: ConnectionTrait>(
    db: &C,
    zone_system_id: &str,
    system_talkgroup_id: &str,
) -> AppResult<zone_system_talkgroup::Model> {
    acquire_sqlite_write_lock::<zone_system::Entity, C>(
        db,
        zone_system::Column::Id,
        zone_system::Column::Position,
        zone_system_id,
    )
    .await?;

    let (placement, system) = zone_system::Entity::find_by_id(zone_system_id.to_string())
        .find_also_related(system::Entity)
        .one(db)
        .await
        .map_err(|e| AppError::from_db("加载系统挂载失败", e))?
        .ok_or_else(|| AppError::not_found_error("ZoneSystem", format!("未找到ID为 {} 的系统挂载", zone_system_id)))?;
    let system = system.ok_or_else(|| {
        AppError::not_found_error("System", format!("未找到ID为 {} 的系统", placement.system_id))
    })?;

    let config = system_talkgroup::Entity::find_by_id(system_talkgroup_id.to_string())
        .one(db)
        .await
        .map_err(|e| AppError::from_db("加载通话组配置失败", e))?
        .ok_or_else(|| {
            AppError::not_found_error("SystemTalkgroup", format!("未找到ID为 {} 的通话组配置", system_talkgroup_id))
        })?;

    let mode = system.mode_detail()?;
    if !mode.mode().is_digital() {
        return Err(AppError::validation_error(format!(
            "系统 {} 为 {}，不能分配通话组",
            system.name, mode
        )));
    }
    if config.system_id != placement.system_id {
        return Err(AppError::validation_error(format!(
            "通话组配置 {} 属于系统 {}，不能分配给系统 {} 的挂载",
            config.id, config.system_id, placement.system_id
        )));
    }

    let duplicate = zone_system_talkgroup::Entity::find()
        .filter(zone_system_talkgroup::Column::ZoneSystemId.eq(placement.id.as_str()))
        .filter(zone_system_talkgroup::Column::SystemTalkgroupId.eq(config.id.as_str()))
        .one(db)
        .await
        .map_err(|e| AppError::from_db("检查重复分配失败", e))?;
    if duplicate.is_some() {
        return Err(AppError::validation_error(format!(
            "通话组配置 {} 已分配给系统挂载 {}",
            config.id, placement.id
        )));
    }

    let assignment = zone_system_talkgroup::ActiveModel {
        id: Set(default_id()),
        zone_system_id: Set(placement.id.clone()),
        system_talkgroup_id: Set(config.id.clone()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| AppError::from_db("创建通话组分配失败", e))?;

    log_user_operation!("为系统挂载 {} 分配通话组配置 {}", placement.id, config.id);
    Ok(assignment)
}

/// 取消系统挂载上的一条通话组分配
pub async fn unassign_talkgroup<C: ConnectionTrait>(
    db: &C,
    zone_system_id: &str,
    system_talkgroup_id: &str,
) -> AppResult<()> {
    let result = zone_system_talkgroup::Entity::delete_many()
        .filter(zone_system_talkgroup::Column::ZoneSystemId.eq(zone_system_id))
        .filter(zone_system_talkgroup::Column::SystemTalkgroupId.eq(system_talkgroup_id))
        .exec(db)
        .await
        .map_err(|e| AppError::from_db("删除通话组分配失败", e))?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found_error(
            "ZoneSystemTalkgroup",
            format!("系统挂载 {} 上没有通话组配置 {} 的分配", zone_system_id, system_talkgroup_id),
        ));
    }

    log_user_operation!("取消系统挂载 {} 的通话组配置 {}", zone_system_id, system_talkgroup_id);
    Ok(())
}
