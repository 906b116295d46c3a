use draft_sync::{BackgroundTasks, SyncCore, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 日志) 和配置
    let config = setup_environment()?;

    tracing::info!(
        work_dir = %config.work_dir,
        channel = %config.sync_channel_name,
        "Draft sync starting..."
    );

    // 2. 打开 store、广播通道
    let core = SyncCore::initialize(&config);

    // 3. 启动时清理一次 (上次崩溃遗留的已支付草稿)
    match core.retention().sweep().await {
        Ok(report) => tracing::info!(removed = report.total(), "Startup sweep finished"),
        Err(e) => tracing::error!(error = %e, "Startup sweep failed"),
    }
    if let Ok(stats) = core.store().stats().await {
        tracing::info!(
            orders = stats.orders,
            active = stats.active_orders,
            items = stats.items,
            "Draft store ready"
        );
    }

    // 4. 后台任务
    let mut tasks = BackgroundTasks::new();
    core.start_background_tasks(&mut tasks);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    tasks.shutdown().await;
    Ok(())
}
