/// 应用层服务模块
///
/// 应用层负责协调领域服务和基础设施服务，划定事务边界，
/// 对外提供码本的信道生成、有序集合维护和通话组分配接口

/// 码本服务 - 事务边界与冲突重试
pub mod codeplug_service;

// 重新导出主要的服务
pub use codeplug_service::CodeplugService;

#[cfg(test)]
mod tests;
