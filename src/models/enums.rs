//! # 模型枚举类型模块
//!
//! ## 业务作用
//! 本模块定义了码本管理中使用的枚举类型，包括：
//! - **系统模式**: 模拟、DMR、P25、NXDN
//! - **信道默认属性**: 亚音模式、发射许可
//! - **有序集合种类**: 码本内分区、分区内系统、分区内信道
//!
//! ## 设计原则
//! - **类型安全**: 使用强类型枚举避免魔法字符串
//! - **字符串转换**: 数据库中以文本存储，提供 Display/FromStr 双向转换

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// 系统工作模式
///
/// 数字模式（DMR、P25、NXDN）携带通话组分配，模拟模式不携带
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemMode {
    /// 模拟调频
    Analog,
    /// DMR 数字移动无线电
    Dmr,
    /// APCO P25
    P25,
    /// NXDN
    Nxdn,
}

impl SystemMode {
    /// 是否为数字模式
    pub fn is_digital(&self) -> bool {
        !matches!(self, SystemMode::Analog)
    }
}

impl Display for SystemMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SystemMode::Analog => "analog",
            SystemMode::Dmr => "dmr",
            SystemMode::P25 => "p25",
            SystemMode::Nxdn => "nxdn",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SystemMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analog" => Ok(SystemMode::Analog),
            "dmr" => Ok(SystemMode::Dmr),
            "p25" => Ok(SystemMode::P25),
            "nxdn" => Ok(SystemMode::Nxdn),
            _ => Err(format!("未知的系统模式: {}", s)),
        }
    }
}

/// 信道亚音模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToneMode {
    /// 无亚音
    None,
    /// 模拟亚音 CTCSS
    Ctcss,
    /// 数字亚音 DCS
    Dcs,
}

impl Default for ToneMode {
    fn default() -> Self {
        ToneMode::None
    }
}

impl Display for ToneMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToneMode::None => "none",
            ToneMode::Ctcss => "ctcss",
            ToneMode::Dcs => "dcs",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ToneMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ToneMode::None),
            "ctcss" => Ok(ToneMode::Ctcss),
            "dcs" => Ok(ToneMode::Dcs),
            _ => Err(format!("未知的亚音模式: {}", s)),
        }
    }
}

/// 信道发射许可
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmitPermission {
    /// 允许发射
    Allow,
    /// 仅接收
    Deny,
}

impl Default for TransmitPermission {
    fn default() -> Self {
        TransmitPermission::Allow
    }
}

impl Display for TransmitPermission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransmitPermission::Allow => "allow",
            TransmitPermission::Deny => "deny",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TransmitPermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(TransmitPermission::Allow),
            "deny" => Ok(TransmitPermission::Deny),
            _ => Err(format!("未知的发射许可: {}", s)),
        }
    }
}

/// 有序集合种类
///
/// 三种有序集合共用同一套追加/删除/重排协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    /// 码本内的分区（父项: 码本）
    CodeplugZones,
    /// 分区内的系统（父项: 分区）
    ZoneSystems,
    /// 分区内的信道（父项: 分区挂载记录）
    ZoneChannels,
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollectionKind::CodeplugZones => "codeplug_zones",
            CollectionKind::ZoneSystems => "zone_systems",
            CollectionKind::ZoneChannels => "zone_channels",
        };
        write!(f, "{}", s)
    }
}
