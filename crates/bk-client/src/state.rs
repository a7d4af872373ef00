//! 连接状态机与延迟操作队列。
//!
//! # 核心逻辑（How）
//! - 状态变量与延迟队列共用一把 `parking_lot::Mutex` 守护的小结构
//!   [`Inner`]，外加一个 `AtomicU8` 标签，让 `fast_path` 能在热路径上
//!   无锁地判断“是否已连接”——先不加锁检查一次，命中再在慢路径里持锁
//!   复核；
//! - 清空延迟队列永远发生在释放锁之后：持锁时把队列整体换出，再在无锁
//!   状态下逐个执行，这样一个在回调里重新进入客户端的调用不会在自己
//!   持有的锁上死锁。

use bk_proto::Transport;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// 一次连接尝试落定后，交给延迟操作的结果。
pub enum ConnectOutcome {
    Ready(Arc<dyn Transport>),
    Failed,
}

pub type DeferredOp = Box<dyn FnOnce(ConnectOutcome) + Send>;

enum State {
    Disconnected,
    Connecting,
    Connected(Arc<dyn Transport>),
}

const TAG_DISCONNECTED: u8 = 0;
const TAG_CONNECTING: u8 = 1;
const TAG_CONNECTED: u8 = 2;

struct Inner {
    state: State,
    deferred: VecDeque<DeferredOp>,
}

pub struct ConnectionState {
    tag: AtomicU8,
    inner: Mutex<Inner>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            tag: AtomicU8::new(TAG_DISCONNECTED),
            inner: Mutex::new(Inner {
                state: State::Disconnected,
                deferred: VecDeque::new(),
            }),
        }
    }

    /// `ensure_connected` 的无锁快路径：只有当标签已经可观察地翻转为
    /// `Connected` 时才返回 `Some`。
    pub fn fast_path(&self) -> Option<Arc<dyn Transport>> {
        if self.tag.load(Ordering::Acquire) != TAG_CONNECTED {
            return None;
        }
        let guard = self.inner.lock();
        match &guard.state {
            State::Connected(transport) => Some(Arc::clone(transport)),
            _ => None,
        }
    }

    /// 慢路径。总是把 `op` 入队；每次连接尝试只对唯一一个调用方返回
    /// `true`，即真正触发 `Disconnected -> Connecting` 迁移的那一个，
    /// 由它负责实际发起连接。
    pub fn enqueue_and_should_connect(&self, op: DeferredOp) -> bool {
        let mut guard = self.inner.lock();
        match &guard.state {
            State::Connected(transport) => {
                let transport = Arc::clone(transport);
                drop(guard);
                op(ConnectOutcome::Ready(transport));
                false
            }
            State::Connecting => {
                guard.deferred.push_back(op);
                false
            }
            State::Disconnected => {
                guard.deferred.push_back(op);
                guard.state = State::Connecting;
                self.tag.store(TAG_CONNECTING, Ordering::Release);
                true
            }
        }
    }

    pub fn on_connect_success(&self, transport: Arc<dyn Transport>) {
        let deferred = {
            let mut guard = self.inner.lock();
            guard.state = State::Connected(Arc::clone(&transport));
            self.tag.store(TAG_CONNECTED, Ordering::Release);
            std::mem::take(&mut guard.deferred)
        };
        for op in deferred {
            op(ConnectOutcome::Ready(Arc::clone(&transport)));
        }
    }

    pub fn on_connect_failure(&self) {
        let deferred = {
            let mut guard = self.inner.lock();
            guard.state = State::Disconnected;
            self.tag.store(TAG_DISCONNECTED, Ordering::Release);
            std::mem::take(&mut guard.deferred)
        };
        for op in deferred {
            op(ConnectOutcome::Failed);
        }
    }

    /// 传输断连或 `close()` 触发：返回原先存活的传输（如果有，调用方
    /// 据此关闭它），以及仍然挂起的延迟操作（`Connected` 状态下通常为
    /// 空，但一次断连与新发起的 `ensure_connected` 竞争时可能留下一个）。
    pub fn on_disconnect(&self) -> (Option<Arc<dyn Transport>>, Vec<DeferredOp>) {
        let mut guard = self.inner.lock();
        let previous = match std::mem::replace(&mut guard.state, State::Disconnected) {
            State::Connected(transport) => Some(transport),
            _ => None,
        };
        self.tag.store(TAG_DISCONNECTED, Ordering::Release);
        let deferred: Vec<DeferredOp> = std::mem::take(&mut guard.deferred).into_iter().collect();
        (previous, deferred)
    }
}
