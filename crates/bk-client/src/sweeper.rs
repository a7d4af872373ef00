//! 超时清扫器：周期性遍历完成表，把超过截止时间的条目以 `RequestTimeout`
//! 判定失败。

use crate::client::Core;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::debug;

pub fn spawn<Ctx: Send + 'static>(core: Arc<Core<Ctx>>) -> JoinHandle<()> {
    let interval = core.config.timeout_task_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if core.is_closed() {
                return;
            }
            sweep_once(&core);
        }
    })
}

/// 也会在传输层报出整条连接级读超时时，由读取循环同步调用一次。
pub fn sweep_once<Ctx: Send + 'static>(core: &Arc<Core<Ctx>>) {
    let now = Instant::now();
    let expired = core.completions.sweep_expired(now);
    if expired.is_empty() {
        return;
    }
    debug!(count = expired.len(), "sweeper expired pending ops");
    for (txn_id, pending) in expired {
        core.fail_pending(txn_id, pending, bk_proto::ClientErrorKind::RequestTimeout);
    }
}
