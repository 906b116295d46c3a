use shared::order::DisplayScope;
use std::sync::Arc;
use tokio::sync::watch;

use crate::broadcast::{BroadcastError, SyncChannel, SyncSubscription};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::Config;
use crate::orders::{
    DisplayState, FinalizationApi, FinalizationBridge, FinalizationError, HttpFinalizationApi,
    OrderProjector, OrderWriter, RetentionWorker, UnconfiguredFinalizationApi,
};
use crate::store::{self, DraftStore};

/// 启动时探测到的运行能力
///
/// Detected once; individual operations never re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `false`: memory-only, no reload persistence, no cross-surface sync
    pub storage_durable: bool,
    /// `false`: writes are store-only, displays update on their own re-reads
    pub broadcast: bool,
}

impl Capabilities {
    pub fn is_degraded(&self) -> bool {
        !self.storage_durable || !self.broadcast
    }

    fn log(&self) {
        if !self.storage_durable {
            tracing::warn!("Draft storage is memory-only: carts are lost on restart and other surfaces cannot see them");
        }
        if !self.broadcast {
            tracing::warn!("Sync broadcast disabled: displays will not be notified of cart changes");
        }
        if !self.is_degraded() {
            tracing::info!("Draft sync running with durable storage and broadcast");
        }
    }
}

/// 草稿同步核心 - 持有 store、广播通道和清理 worker
///
/// Clone is cheap; all parts are shared.
#[derive(Clone)]
pub struct SyncCore {
    config: Config,
    store: Arc<dyn DraftStore>,
    channel: SyncChannel,
    retention: RetentionWorker,
    capabilities: Capabilities,
}

impl std::fmt::Debug for SyncCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCore")
            .field("channel", &self.channel.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl SyncCore {
    /// 按配置初始化：打开 store（失败则降级为内存），创建广播通道
    pub fn initialize(config: &Config) -> Self {
        if let Err(e) = std::fs::create_dir_all(&config.work_dir) {
            tracing::warn!(work_dir = %config.work_dir, error = %e, "Failed to create work directory");
        }

        let opened = store::open_store(config.db_path());
        Self::with_store(config, opened.store, opened.durable)
    }

    /// 使用已打开的 store 组装
    pub fn with_store(config: &Config, store: Arc<dyn DraftStore>, durable: bool) -> Self {
        let channel = if config.broadcast_enabled {
            SyncChannel::new(config.sync_channel_name.clone(), config.sync_channel_capacity)
        } else {
            SyncChannel::unavailable(config.sync_channel_name.clone())
        };

        let capabilities = Capabilities {
            storage_durable: durable,
            broadcast: channel.is_available(),
        };
        capabilities.log();

        let retention = RetentionWorker::new(store.clone(), channel.clone(), config.retention());

        Self {
            config: config.clone(),
            store,
            channel,
            retention,
            capabilities,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.store
    }

    pub fn channel(&self) -> &SyncChannel {
        &self.channel
    }

    pub fn retention(&self) -> &RetentionWorker {
        &self.retention
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn subscribe(&self) -> Result<SyncSubscription, BroadcastError> {
        self.channel.subscribe()
    }

    /// 收银员会话的写入端
    pub fn writer(&self, cashier_id: impl Into<String>) -> OrderWriter {
        OrderWriter::new(
            self.store.clone(),
            self.channel.clone(),
            self.config.pricing(),
            cashier_id,
        )
    }

    /// 显示端投影
    pub fn projector(&self, scope: DisplayScope) -> OrderProjector {
        OrderProjector::new(self.store.clone(), scope, self.config.celebration())
    }

    pub fn finalization_bridge(&self, api: Arc<dyn FinalizationApi>) -> FinalizationBridge {
        FinalizationBridge::new(
            self.store.clone(),
            self.channel.clone(),
            api,
            self.retention.clone(),
        )
    }

    /// HTTP API when `FINALIZE_API_URL` is set, otherwise one that always fails
    pub fn configured_finalization_api(&self) -> Result<Arc<dyn FinalizationApi>, FinalizationError> {
        match &self.config.finalize_api_url {
            Some(url) => Ok(Arc::new(HttpFinalizationApi::new(url)?)),
            None => {
                tracing::warn!("FINALIZE_API_URL not set, finalization will fail until configured");
                Ok(Arc::new(UnconfiguredFinalizationApi))
            }
        }
    }

    /// 启动清理 worker
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let worker = self.retention.clone();
        let token = tasks.shutdown_token();
        tasks.spawn("retention_worker", TaskKind::Periodic, worker.run(token));
    }

    /// 启动一个显示端投影循环，返回其状态接收端
    ///
    /// Without broadcast the projector still loads once; it is then only as
    /// fresh as its last re-read.
    pub async fn spawn_projector(
        &self,
        tasks: &mut BackgroundTasks,
        scope: DisplayScope,
    ) -> watch::Receiver<DisplayState> {
        let mut projector = self.projector(scope.clone());
        let rx = projector.watch();

        match self.channel.subscribe() {
            Ok(subscription) => {
                let token = tasks.shutdown_token();
                tasks.spawn(
                    format!("projector[{}]", scope),
                    TaskKind::Listener,
                    async move { projector.run(subscription, token).await },
                );
            }
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "Projector running without live updates");
                if let Err(e) = projector.refresh().await {
                    tracing::warn!(scope = %scope, error = %e, "Initial display load failed");
                }
            }
        }
        rx
    }
}
