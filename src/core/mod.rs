//! 核心模块
//!
//! 包含共享上下文和应用程序生命周期管理

pub mod app;
pub mod context;

// 重新导出主要类型
pub use app::run;
pub use context::AppContext;
