/// 错误处理模块
///
/// 业务说明：
/// 本模块是应用程序错误处理的统一入口点
/// 通过重新导出utils::error中的所有错误类型，简化了错误类型的导入路径
///
/// 使用示例：
/// ```rust
/// use codeplug_lib::error::{AppError, AppResult};
///
/// fn check_position(position: i32) -> AppResult<i32> {
///     if position < 1 {
///         return Err(AppError::validation_error("位置必须从1开始"));
///     }
///     Ok(position)
/// }
///
/// assert!(check_position(0).is_err());
/// ```

pub use crate::utils::error::*;
