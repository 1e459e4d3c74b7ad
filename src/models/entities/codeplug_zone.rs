// 文件: src/models/entities/codeplug_zone.rs
// 分区挂载记录（码本-分区）实体的SeaORM定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 分区挂载记录
///
/// 将一个分区以指定位置挂载到一个码本；
/// (codeplug_id, position) 与 (codeplug_id, zone_id) 均唯一
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "codeplug_zones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub codeplug_id: String,
    pub zone_id: String,
    pub position: i32,
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
        belongs_to = "super::zone::Entity",
        from = "Column::ZoneId",
        to = "super::zone::Column::Id",
        on_delete = "Cascade"
    )]
    Zone,
}

impl Related<super::codeplug::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Codeplug.def()
    }
}

impl Related<super::zone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Zone.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
