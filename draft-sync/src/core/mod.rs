//! 核心模块 - 配置、运行能力和后台任务
//!
//! # 模块结构
//!
//! - [`Config`] - 环境变量配置
//! - [`SyncCore`] - store + 广播通道 + 清理 worker 的组装
//! - [`Capabilities`] - 启动时探测的降级状态
//! - [`BackgroundTasks`] - 后台任务注册和关闭

pub mod config;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::{Capabilities, SyncCore};
pub use tasks::{BackgroundTasks, TaskKind};
