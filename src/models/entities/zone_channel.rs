// 文件: src/models/entities/zone_channel.rs
// 信道挂载记录（分区-信道）实体的SeaORM定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 信道挂载记录
///
/// 父项是分区挂载记录（codeplug_zone_id），同一分区被多个码本共享时
/// 各码本的信道编号互不干扰；(codeplug_zone_id, position) 唯一。
/// zone_id / codeplug_id 为冗余列，便于按分区或码本查询
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "zone_channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub codeplug_zone_id: String,
    pub codeplug_id: String,
    pub zone_id: String,
    pub channel_id: String,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::codeplug_zone::Entity",
        from = "Column::CodeplugZoneId",
        to = "super::codeplug_zone::Column::Id",
        on_delete = "Cascade"
    )]
    CodeplugZone,
    #[sea_orm(
        belongs_to = "super::channel::Entity",
        from = "Column::ChannelId",
        to = "super::channel::Column::Id",
        on_delete = "Cascade"
    )]
    Channel,
}

impl Related<super::codeplug_zone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CodeplugZone.def()
    }
}

impl Related<super::channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
