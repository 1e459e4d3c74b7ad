/// 服务层模块，包含应用层和领域层的服务定义
///
/// 按照清洁架构原则组织：
/// - Application Layer: 应用服务，划定事务边界并处理冲突重试
/// - Domain Layer: 领域服务，包含有序集合协议和信道生成
/// - Infrastructure Layer: 基础设施服务，处理数据库连接与配置图持久化

/// 应用层服务模块
pub mod application;

/// 领域层服务模块
pub mod domain;

/// 基础设施层服务模块
pub mod infrastructure;

/// 服务层基础trait定义
pub mod traits;

// 重新导出基础trait
pub use traits::{
    BaseService, IChannelGenerationService, IOrderedCollectionService, ITalkgroupAssignmentService,
    PersistenceService,
};

// 重新导出应用层服务
pub use application::CodeplugService;

// 重新导出领域层服务
pub use domain::{derive_short_name, ChannelGenerator, OrderedCollection, OrderedPlacement};

// 重新导出基础设施层的主要类型
pub use infrastructure::SqliteOrmPersistenceService;
