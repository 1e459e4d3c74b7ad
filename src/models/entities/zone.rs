// 文件: src/models/entities/zone.rs
// 分区实体的SeaORM定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// 分区实体
///
/// 独立拥有、可复用的系统集合；不属于任何码本，
/// 通过 codeplug_zones 挂载到任意数量的码本
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "zones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// 公开分区可被其他用户读取和挂载
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
