// 文件: src/models/entities/zone_system_talkgroup.rs
// 通话组分配实体的SeaORM定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// 通话组分配
///
/// 将一条系统级通话组配置绑定到一个系统挂载记录；集合语义，无位置。
/// 生成时按 created_at、id 升序遍历
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "zone_system_talkgroups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub zone_system_id: String,
    pub system_talkgroup_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::zone_system::Entity",
        from = "Column::ZoneSystemId",
        to = "super::zone_system::Column::Id",
        on_delete = "Cascade"
    )]
    ZoneSystem,
    #[sea_orm(
        belongs_to = "super::system_talkgroup::Entity",
        from = "Column::SystemTalkgroupId",
        to = "super::system_talkgroup::Column::Id",
        on_delete = "Cascade"
    )]
    SystemTalkgroup,
}

impl Related<super::zone_system::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ZoneSystem.def()
    }
}

impl Related<super::system_talkgroup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SystemTalkgroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
