use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::enums::{SystemMode, ToneMode, TransmitPermission};
use crate::utils::error::{AppError, AppResult};

/// 生成默认UUID字符串的辅助函数
pub fn default_id() -> String {
    Uuid::new_v4().to_string()
}

/// 系统模式详情
///
/// 以和类型替代“系统行 + 按类型标签选择的模式副表”，
/// 校验和显示两处通过穷尽匹配处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeDetail {
    /// 模拟调频，无附加参数
    Analog,
    /// DMR，色码 0-15
    Dmr { color_code: u8 },
    /// P25，网络接入码 0x000-0xFFF
    P25 { nac: u16 },
    /// NXDN，无线接入号 0-63
    Nxdn { ran: u8 },
}

impl ModeDetail {
    /// 对应的系统模式
    pub fn mode(&self) -> SystemMode {
        match self {
            ModeDetail::Analog => SystemMode::Analog,
            ModeDetail::Dmr { .. } => SystemMode::Dmr,
            ModeDetail::P25 { .. } => SystemMode::P25,
            ModeDetail::Nxdn { .. } => SystemMode::Nxdn,
        }
    }

    /// 校验模式参数的取值范围
    pub fn validate(&self) -> AppResult<()> {
        match *self {
            ModeDetail::Analog => Ok(()),
            ModeDetail::Dmr { color_code } if color_code > 15 => Err(AppError::validation_error(
                format!("DMR色码超出范围(0-15): {}", color_code),
            )),
            ModeDetail::Dmr { .. } => Ok(()),
            ModeDetail::P25 { nac } if nac > 0xFFF => Err(AppError::validation_error(
                format!("P25 NAC超出范围(0x000-0xFFF): {:#05X}", nac),
            )),
            ModeDetail::P25 { .. } => Ok(()),
            ModeDetail::Nxdn { ran } if ran > 63 => Err(AppError::validation_error(
                format!("NXDN RAN超出范围(0-63): {}", ran),
            )),
            ModeDetail::Nxdn { .. } => Ok(()),
        }
    }

    /// 从数据库的内联列还原模式详情
    ///
    /// 判别列与参数列必须一致，否则视为验证错误
    pub fn from_columns(
        mode: &str,
        color_code: Option<i32>,
        nac: Option<i32>,
        ran: Option<i32>,
    ) -> AppResult<Self> {
        let mode: SystemMode = mode.parse().map_err(AppError::validation_error)?;
        let detail = match mode {
            SystemMode::Analog => ModeDetail::Analog,
            SystemMode::Dmr => ModeDetail::Dmr {
                color_code: required_column("color_code", color_code, u8::MAX as i32)? as u8,
            },
            SystemMode::P25 => ModeDetail::P25 {
                nac: required_column("nac", nac, u16::MAX as i32)? as u16,
            },
            SystemMode::Nxdn => ModeDetail::Nxdn {
                ran: required_column("ran", ran, u8::MAX as i32)? as u8,
            },
        };
        detail.validate()?;
        Ok(detail)
    }

    /// 拆分为数据库内联列 (mode, color_code, nac, ran)
    pub fn to_columns(&self) -> (String, Option<i32>, Option<i32>, Option<i32>) {
        match *self {
            ModeDetail::Analog => (SystemMode::Analog.to_string(), None, None, None),
            ModeDetail::Dmr { color_code } => {
                (SystemMode::Dmr.to_string(), Some(color_code as i32), None, None)
            }
            ModeDetail::P25 { nac } => (SystemMode::P25.to_string(), None, Some(nac as i32), None),
            ModeDetail::Nxdn { ran } => (SystemMode::Nxdn.to_string(), None, None, Some(ran as i32)),
        }
    }
}

fn required_column(column: &str, value: Option<i32>, max: i32) -> AppResult<i32> {
    match value {
        Some(v) if (0..=max).contains(&v) => Ok(v),
        Some(v) => Err(AppError::validation_error(format!("列 {} 的取值无效: {}", column, v))),
        None => Err(AppError::validation_error(format!("数字模式缺少参数列: {}", column))),
    }
}

impl Display for ModeDetail {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeDetail::Analog => write!(f, "Analog FM"),
            ModeDetail::Dmr { color_code } => write!(f, "DMR (CC{})", color_code),
            ModeDetail::P25 { nac } => write!(f, "P25 (NAC {:03X})", nac),
            ModeDetail::Nxdn { ran } => write!(f, "NXDN (RAN {})", ran),
        }
    }
}

/// 有序集合中的一条挂载记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// 挂载记录ID
    pub id: String,
    /// 父项ID
    pub parent_id: String,
    /// 子项ID
    pub child_id: String,
    /// 在父项内的位置（从1开始）
    pub position: i32,
}

/// 有序集合连续性检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContiguityReport {
    /// 父项ID
    pub parent_id: String,
    /// 按升序排列的实际位置
    pub positions: Vec<i32>,
    /// 是否恰好为 {1..N}
    pub is_contiguous: bool,
}

impl ContiguityReport {
    pub fn from_positions(parent_id: impl Into<String>, mut positions: Vec<i32>) -> Self {
        positions.sort_unstable();
        let is_contiguous = positions
            .iter()
            .enumerate()
            .all(|(index, position)| *position == index as i32 + 1);
        Self {
            parent_id: parent_id.into(),
            positions,
            is_contiguous,
        }
    }
}

/// 信道生成结果摘要
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// 新建信道数量
    pub channels_created: u32,
    /// 新建信道挂载记录数量
    pub channel_placements_created: u32,
    /// 遍历的分区挂载数量（包括没有产生信道的分区）
    pub zones_processed: u32,
    /// 重新生成前删除的旧信道数量
    pub channels_deleted: u32,
    /// 因已有信道且未要求重新生成而跳过
    pub skipped: bool,
}

impl GenerationSummary {
    /// 跳过生成时的摘要
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// 已生成信道在某个分区中的只读视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelView {
    pub channel_id: String,
    /// 所在分区挂载记录ID
    pub codeplug_zone_id: String,
    pub zone_id: String,
    /// 分区内位置
    pub position: i32,
    pub system_id: String,
    /// 模拟信道为 None
    pub system_talkgroup_id: Option<String>,
    pub name: String,
    pub long_name: String,
    pub short_name: String,
    pub tone_mode: ToneMode,
    pub transmit_permission: TransmitPermission,
}
