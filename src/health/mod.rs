//! 自检模块
//!
//! 提供HTTP探测、结果处理和周期任务调度功能

pub mod probe;
pub mod result;
pub mod scheduler;

// 重新导出主要类型
pub use probe::{HealthProbe, HttpProbe};
pub use result::{ProbeOutcome, ProbeReport};
pub use scheduler::{ExternalTaskState, PingScheduler};
