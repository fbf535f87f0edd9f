//! 账本变更的截止时间
//!
//! 变更一旦开始就在独立任务中运行：HTTP 请求被取消不会打断事务。
//! 截止时间只约束提交之前的工作（取连接、行锁、校验、写入）：
//! 超时时事务尚未提交，随 future 一起被丢弃并回滚；
//! 已经发出的 COMMIT 总是等到结果，调用方不会在提交成功后收到超时错误。

use std::{future::Future, time::Duration};

use tokio::time::Instant;

use crate::domain::{WalletError, WalletResult};

tokio::task_local! {
    /// 当前变更任务的提交截止时间，由 `run_mutation` 设置
    static COMMIT_DEADLINE: Instant;
    /// 调用方为本次请求给出的超时，由 HTTP 中间件设置
    static CALLER_TIMEOUT: Duration;
}

fn timed_out() -> WalletError {
    WalletError::Internal("operation timed out".into())
}

/// 在调用方超时范围内执行 `fut`；其中发起的变更取调用方超时与服务默认值中较小者
pub async fn with_caller_timeout<F: Future>(timeout: Duration, fut: F) -> F::Output {
    CALLER_TIMEOUT.scope(timeout, fut).await
}

fn effective_timeout(default: Duration) -> Duration {
    CALLER_TIMEOUT
        .try_with(|caller| (*caller).min(default))
        .unwrap_or(default)
}

pub async fn run_mutation<T, F>(timeout: Duration, operation: &'static str, fut: F) -> WalletResult<T>
where
    T: Send + 'static,
    F: Future<Output = WalletResult<T>> + Send + 'static,
{
    let timeout = effective_timeout(timeout);
    let deadline = Instant::now() + timeout;
    let handle = tokio::spawn(COMMIT_DEADLINE.scope(deadline, fut));

    match handle.await {
        Ok(Err(err)) if err == timed_out() => {
            tracing::warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "ledger operation timed out before commit, rolled back"
            );
            Err(err)
        }
        Ok(result) => result,
        Err(join_err) => {
            tracing::error!(operation, error = %join_err, "ledger operation task failed");
            Err(WalletError::Internal("operation aborted".into()))
        }
    }
}

/// 提交前的工作受截止时间约束；不在 `run_mutation` 内调用时不设限
///
/// 超时返回错误，调用方随之丢弃未提交的事务。
pub async fn before_commit<T, F>(work: F) -> WalletResult<T>
where
    F: Future<Output = WalletResult<T>>,
{
    match COMMIT_DEADLINE.try_with(|deadline| *deadline) {
        Ok(deadline) => tokio::time::timeout_at(deadline, work)
            .await
            .map_err(|_| timed_out())?,
        Err(_) => work.await,
    }
}
