// 备份模块：任务规划与执行

pub mod planner;
pub mod runner;
pub mod task;

pub use planner::{TaskPlan, TaskPlanner};
pub use runner::{BackupError, BackupReport, BackupRunner};
pub use task::{BackupTask, TaskKind, TaskStatus};
