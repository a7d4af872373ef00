//! 默认的 [`OrderedExecutor`] 实现：每个仍活跃的排序键惰性地对应一个
//! Tokio worker，队列排空后即退役。同一个键下的任务严格按提交顺序
//! 执行；不同键上的任务各自在自己的 worker 上并发执行。
//!
//! # 核心逻辑（How）
//! 与 [`crate::completion::CompletionTable`] 一样，用 `DashMap` 充当
//! 并发注册表；另外用一套“CAS 运行标志、排空、退役前再检查一次”的
//! 模式，确保每个键至多只有一个排空者在跑。

use bk_proto::{OrderedExecutor, OrderedTask};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct KeyQueue {
    tasks: Mutex<VecDeque<OrderedTask>>,
    running: AtomicBool,
}

impl KeyQueue {
    fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
        }
    }
}

/// 基于 Tokio 的 [`OrderedExecutor`]。适合作为默认实现，供没有自带
/// 排序机制的调用方直接使用。
#[derive(Default)]
pub struct TokioOrderedExecutor {
    queues: Arc<DashMap<u64, Arc<KeyQueue>>>,
}

impl TokioOrderedExecutor {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(DashMap::new()),
        }
    }

    fn spawn_drain(key: u64, queue: Arc<KeyQueue>, registry: Arc<DashMap<u64, Arc<KeyQueue>>>) {
        tokio::spawn(async move {
            loop {
                let next = queue.tasks.lock().pop_front();
                match next {
                    Some(task) => task(),
                    None => {
                        queue.running.store(false, Ordering::Release);
                        if queue.tasks.lock().is_empty() {
                            registry.remove_if(&key, |_, existing| Arc::ptr_eq(existing, &queue));
                            return;
                        }
                        if queue
                            .running
                            .compare_exchange(
                                false,
                                true,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
        });
    }
}

impl OrderedExecutor for TokioOrderedExecutor {
    fn submit_ordered(&self, key: u64, task: OrderedTask) {
        let queue = self
            .queues
            .entry(key)
            .or_insert_with(|| Arc::new(KeyQueue::new()))
            .clone();
        queue.tasks.lock().push_back(task);

        if queue
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Self::spawn_drain(key, queue, Arc::clone(&self.queues));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn same_key_tasks_run_in_submission_order() {
        let executor = TokioOrderedExecutor::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20u64 {
            let order = Arc::clone(&order);
            executor.submit_ordered(1, Box::new(move || order.lock().push(i)));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        let recorded = order.lock().clone();
        assert_eq!(recorded, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn different_keys_all_complete() {
        let executor = TokioOrderedExecutor::new();
        let completed = Arc::new(AtomicU64::new(0));
        for key in 0..8u64 {
            let completed = Arc::clone(&completed);
            executor.submit_ordered(
                key,
                Box::new(move || {
                    completed.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 8);
    }
}
