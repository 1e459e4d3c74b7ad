/// 数据持久化相关模块

pub mod sqlite_orm_persistence_service;

pub use sqlite_orm_persistence_service::SqliteOrmPersistenceService;
