// 文件: src/models/entities/channel.rs
// 信道实体的SeaORM定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// 信道实体
///
/// 只由信道生成器创建，每次重新生成时整体删除重建
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub codeplug_id: String,
    pub system_id: String,
    /// 模拟信道为空
    #[sea_orm(nullable)]
    pub system_talkgroup_id: Option<String>,
    pub name: String,                   // 显示名称
    pub long_name: String,              // 长名称
    pub short_name: String,             // 短名称（不超过8个字符，无空白）
    pub tone_mode: String,
    pub transmit_permission: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::codeplug::Entity",
        from = "Column::CodeplugId",
        to = "super::codeplug::Column::Id",
        on_delete = "Cascade"
    )]
    Codeplug,
    #[sea_orm(
        belongs_to = "super::system::Entity",
        from = "Column::SystemId",
        to = "super::system::Column::Id",
        on_delete = "Cascade"
    )]
    System,
    #[sea_orm(
        belongs_to = "super::system_talkgroup::Entity",
        from = "Column::SystemTalkgroupId",
        to = "super::system_talkgroup::Column::Id",
        on_delete = "SetNull"
    )]
    SystemTalkgroup,
}

impl Related<super::codeplug::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Codeplug.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
