// 文件: src/models/entities/system.rs
// 系统（中继/电台系统）实体的SeaORM定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::structs::ModeDetail;
use crate::utils::error::AppResult;

/// 系统实体
///
/// 模式详情以判别列 + 参数列内联存储，读取时还原为 ModeDetail
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "systems")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// analog / dmr / p25 / nxdn
    pub mode: String,
    #[sea_orm(nullable)]
    pub color_code: Option<i32>,         // DMR 色码
    #[sea_orm(nullable)]
    pub nac: Option<i32>,                // P25 网络接入码
    #[sea_orm(nullable)]
    pub ran: Option<i32>,                // NXDN 无线接入号
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 还原并校验模式详情
    pub fn mode_detail(&self) -> AppResult<ModeDetail> {
        ModeDetail::from_columns(&self.mode, self.color_code, self.nac, self.ran)
    }
}
