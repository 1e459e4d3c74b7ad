/// 领域服务层模块
/// 包含核心业务逻辑：有序集合位置协议、信道生成、通话组分配

/// 有序集合 - 追加/删除/重排并保持位置连续
pub mod ordered_collection;

/// 信道生成器 - 把配置图展开成有序信道列表
pub mod channel_generator;

/// 通话组分配 - 系统挂载上的无序通话组集合
pub mod talkgroup_assignment;

// 重新导出常用类型
pub use ordered_collection::{plan_reorder, OrderedCollection, OrderedPlacement};
pub use channel_generator::{derive_short_name, ChannelGenerator, SHORT_NAME_MAX_CHARS};
pub use talkgroup_assignment::{assign_talkgroup, unassign_talkgroup};
