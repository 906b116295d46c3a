//! Draft Sync - 收银台草稿订单实时同步
//!
//! # 架构概述
//!
//! A cashier builds a cart; every change is saved to a local durable store
//! and then announced on a broadcast channel so customer displays and other
//! surfaces re-read it. At payment the draft is handed to the remote order
//! API, marked paid and cleaned up shortly after.
//!
//! - **存储** (`store`): redb 草稿库，打开失败时降级为内存
//! - **广播** (`broadcast`): 进程内变更通知
//! - **订单** (`orders`): 写入端、显示投影、结账、清理
//! - **核心** (`core`): 配置、运行能力、后台任务
//!
//! # 模块结构
//!
//! ```text
//! draft-sync/src/
//! ├── core/          # 配置、SyncCore、后台任务
//! ├── store/         # DraftStore trait, redb / memory
//! ├── broadcast/     # SyncChannel
//! ├── orders/        # writer, reader, scope, finalize, retention, money
//! └── utils/         # 日志
//! ```

pub mod broadcast;
pub mod core;
pub mod orders;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use broadcast::{BroadcastError, Recv, SyncChannel, SyncSubscription};
pub use core::{BackgroundTasks, Capabilities, Config, SyncCore, TaskKind};
pub use orders::{
    CartState, DisplayState, FinalizationBridge, OrderProjector, OrderView, OrderWriter,
    SyncError, SyncResult,
};
pub use store::{DraftStore, MemoryDraftStore, RedbDraftStore, StoreError};

pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境：加载 `.env`，初始化日志
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to initialize logger: {e}"))?;
    Ok(config)
}
