// 文件: src/models/entities/system_talkgroup.rs
// 系统级通话组配置实体的SeaORM定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 系统级通话组配置
///
/// 系统从网络通话组中选取的可用子集，供分区内的系统挂载选择
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_talkgroups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub system_id: String,
    pub talkgroup_id: String,
    /// DMR 时隙 (1/2)，其他模式为空
    #[sea_orm(nullable)]
    pub timeslot: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::system::Entity",
        from = "Column::SystemId",
        to = "super::system::Column::Id",
        on_delete = "Cascade"
    )]
    System,
    #[sea_orm(
        belongs_to = "super::talkgroup::Entity",
        from = "Column::TalkgroupId",
        to = "super::talkgroup::Column::Id",
        on_delete = "Cascade"
    )]
    Talkgroup,
}

impl Related<super::system::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::System.def()
    }
}

impl Related<super::talkgroup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Talkgroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
