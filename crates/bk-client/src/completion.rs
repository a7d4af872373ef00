//! 完成表：一张并发的 `txn_id -> pending_op` 映射，由 I/O 读取路径、
//! 写入路径、清扫器与断连处理器共同使用。
//!
//! # 核心逻辑（How）
//! - 扁平的一张 `DashMap`，插入/删除都是原子操作，外部不再加锁；
//! - 用同一张表、以 `txn_id` 为键同时覆盖 add 与 read 两类完成项，
//!   `op_type` 只是随值附带、供响应路由器自检用，从不参与键的构成。

use bk_proto::{OpType, PeerAddress, TxnId};
use bytes::Bytes;
use dashmap::DashMap;
use std::time::Instant;

pub type AddCallback<Ctx> =
    Box<dyn FnOnce(bk_proto::ClientErrorKind, i64, i64, PeerAddress, Ctx) + Send>;
pub type ReadCallback<Ctx> =
    Box<dyn FnOnce(bk_proto::ClientErrorKind, i64, i64, Option<Bytes>, Ctx) + Send>;

/// 一个正在等待响应、超时或提前失败的请求。
///
/// `started_at`/`deadline` 用不带墙钟语义的 `Instant`，清扫器因此完全
/// 不必考虑时钟回拨；`deadline` 总是插入时一次性算好的
/// `started_at + request_timeout`。
pub enum PendingOp<Ctx> {
    Add {
        ledger_id: i64,
        entry_id: i64,
        cb: AddCallback<Ctx>,
        ctx: Ctx,
        started_at: Instant,
        deadline: Instant,
    },
    Read {
        ledger_id: i64,
        entry_id: i64,
        cb: ReadCallback<Ctx>,
        ctx: Ctx,
        started_at: Instant,
        deadline: Instant,
    },
}

impl<Ctx> PendingOp<Ctx> {
    pub fn op_type(&self) -> OpType {
        match self {
            PendingOp::Add { .. } => OpType::AddEntry,
            PendingOp::Read { .. } => OpType::ReadEntry,
        }
    }

    pub fn ledger_id(&self) -> i64 {
        match self {
            PendingOp::Add { ledger_id, .. } | PendingOp::Read { ledger_id, .. } => *ledger_id,
        }
    }

    pub fn entry_id(&self) -> i64 {
        match self {
            PendingOp::Add { entry_id, .. } | PendingOp::Read { entry_id, .. } => *entry_id,
        }
    }

    pub fn deadline(&self) -> Instant {
        match self {
            PendingOp::Add { deadline, .. } | PendingOp::Read { deadline, .. } => *deadline,
        }
    }

    pub fn started_at(&self) -> Instant {
        match self {
            PendingOp::Add { started_at, .. } | PendingOp::Read { started_at, .. } => *started_at,
        }
    }
}

/// 并发完成表。这里的每个方法都是单次原子 `DashMap` 操作；
/// “至多一次回调”这条不变式直接来自 `remove` 的原子性：观察到
/// `Some` 的那个线程，就是唯一有权交付该回调的线程。
#[derive(Default)]
pub struct CompletionTable<Ctx> {
    entries: DashMap<TxnId, PendingOp<Ctx>>,
}

impl<Ctx> CompletionTable<Ctx> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 插入一个新的挂起操作。`txn_id` 重复时返回 `false`：这是单调 id
    /// 生成器自身的不变式被破坏，而不是一个需要恢复的正常状况；调用方
    /// 记录日志并丢弃新操作，不覆盖已有项。
    pub fn insert(&self, txn_id: TxnId, pending: PendingOp<Ctx>) -> bool {
        match self.entries.entry(txn_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(pending);
                true
            }
        }
    }

    pub fn remove(&self, txn_id: TxnId) -> Option<PendingOp<Ctx>> {
        self.entries.remove(&txn_id).map(|(_, pending)| pending)
    }

    /// 扫描整张表，把已过期的条目摘下来。
    ///
    /// 两遍式实现（先收集 id 再逐个移除），这样与之竞争同一个键的响应
    /// 只会看到 `remove` 返回 `None`，而不是让清扫过程直接对一个存活中
    /// 的 `DashMap` 迭代器做变更。
    ///
    /// 返回前按 `txn_id` 升序排列：`DashMap::iter` 按分片/哈希顺序遍历，
    /// 不是插入顺序，而调用方会把返回列表逐个送进有序执行器；由于
    /// `txn_id` 是单调分配的，这里的升序就是提交顺序。
    pub fn sweep_expired(&self, now: Instant) -> Vec<(TxnId, PendingOp<Ctx>)> {
        let mut expired_ids: Vec<TxnId> = self
            .entries
            .iter()
            .filter(|entry| entry.value().deadline() <= now)
            .map(|entry| *entry.key())
            .collect();
        expired_ids.sort_unstable();
        expired_ids
            .into_iter()
            .filter_map(|id| self.remove(id).map(|pending| (id, pending)))
            .collect()
    }

    /// 清空整张表，供 `close()` 与传输断连两处调用。排序理由同
    /// `sweep_expired`。
    pub fn drain(&self) -> Vec<(TxnId, PendingOp<Ctx>)> {
        let mut ids: Vec<TxnId> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.remove(id).map(|pending| (id, pending)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
