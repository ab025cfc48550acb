//! 任务日志模块
//!
//! 备份状态完全由两个追加式文本日志描述：
//! - `keys.log`：意图，“这个 key 需要备份”
//! - `history.log`：结果，“这个 key+时间戳 下载到了多少字节”
//!
//! ## 设计原则
//!
//! 1. **只追加**: 记录写入后不再修改，重做时追加新行
//! 2. **容错性**: 读取时跳过格式错误的行，崩溃留下的半行不会阻塞规划
//! 3. **单写者**: 工作目录只由本进程写入

pub mod escape;
pub mod file;
pub mod history;
pub mod keys;
pub mod types;
pub mod workspace;

pub use escape::{escape, unescape};
pub use file::LedgerError;
pub use history::HistoryLedger;
pub use keys::KeyLedger;
pub use types::{HistoryDetail, TaskId, TaskIdError};
pub use workspace::BackupWorkspace;
