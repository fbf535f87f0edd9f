//! Krypton Wallet 主入口

use std::sync::Arc;

use anyhow::{Context, Result};
use krypton_wallet::{api, app_state::AppState, config::Config, infrastructure};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量与配置文件（CONFIG_PATH 可选）
    dotenvy::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate()?;

    // 2. 初始化日志
    infrastructure::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;

    tracing::info!("starting krypton wallet");

    // 3. 连接数据库
    let pool = infrastructure::db::init_pool(&config.database)
        .await
        .context("database connection failed")?;

    // 4. 运行数据库迁移（生产环境可用 wallet_migrate 单独执行）
    if std::env::var("SKIP_MIGRATIONS").is_err() {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("database migrations failed")?;
        tracing::info!("database migrations completed");
    } else {
        tracing::info!("database migrations skipped (SKIP_MIGRATIONS set)");
    }

    // 5. 组装状态与路由
    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::with_postgres(Arc::new(config), pool));
    let app = api::routes(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
