/// 码本管理 - 信道生成与有序集合维护核心库
pub mod utils;
pub mod error;
pub mod logging;
pub mod models;
pub mod database_migration;
pub mod services;
pub mod app_state;

// 重新导出常用类型，方便使用
pub use models::*;
pub use utils::{AppError, AppResult, AppConfig};
pub use services::*;
pub use app_state::{AppState, SystemStatus, init_app_state};
