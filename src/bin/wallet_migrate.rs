//! 数据库迁移工具
//!
//! wallet_migrate up    执行全部未应用的迁移
//! wallet_migrate down  回滚最近一次迁移

use anyhow::{bail, Context, Result};
use krypton_wallet::{config::Config, infrastructure};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    infrastructure::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    let pool = infrastructure::db::init_pool(&config.database)
        .await
        .context("database connection failed")?;
    let migrator = sqlx::migrate!("./migrations");

    match command.as_str() {
        "up" => {
            migrator.run(&pool).await?;
            tracing::info!("migrations applied");
        }
        "down" => {
            let applied: Option<i64> =
                sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success")
                    .fetch_one(&pool)
                    .await
                    .context("failed to read migration history")?;
            let Some(latest) = applied else {
                tracing::info!("nothing to roll back");
                return Ok(());
            };
            // undo 回滚所有 version > target 的迁移
            let target = migrator
                .iter()
                .map(|m| m.version)
                .filter(|v| *v < latest)
                .max()
                .unwrap_or(0);
            migrator.undo(&pool, target).await?;
            tracing::info!(version = latest, "migration rolled back");
        }
        other => bail!("unknown command `{other}`, expected `up` or `down`"),
    }

    Ok(())
}
