// 文件: src/models/entities/mod.rs
// 声明 entities 模块下的所有实体

// 配置图
pub mod codeplug;
pub mod zone;
pub mod system;
pub mod talkgroup;
pub mod system_talkgroup;

// 有序挂载记录
pub mod codeplug_zone;
pub mod zone_system;
pub mod zone_system_talkgroup;

// 生成产物
pub mod channel;
pub mod zone_channel;
