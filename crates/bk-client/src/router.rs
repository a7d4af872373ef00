//! 请求构造器与响应路由器。
//!
//! # 核心逻辑（How）
//! - 构造请求纯粹是数据整形，txn id 由调用方提前分配好；
//! - 路由响应则是“解码、按 `txn_id` 查表、翻译状态、移交有序执行器”
//!   这一套固定流程。分派从不内联执行用户回调，传输线程永远只向
//!   [`bk_proto::OrderedExecutor`] 提交一个闭包，不直接调用回调本身。
//!
//! # 设计取舍（Trade-offs）
//! 特殊的 `LAST_ADD_CONFIRMED` 哨兵读（其响应会报告一个由服务端解析出
//! 的、与请求不同的 `entry_id`）在这里不需要额外的回退查找：完成表以
//! `txn_id` 而非 `(ledger_id, entry_id)` 为键，响应回显的 `txn_id` 已经
//! 足够定位原始请求，无论服务端把哨兵值解析成了哪个 `entry_id`。

use crate::completion::PendingOp;
use bk_proto::{
    ClientErrorKind, MetricsSink, OrderedExecutor, RequestBody, RequestFlags, ResponseBody, TxnId,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{trace, warn};

pub fn build_add_request(
    ledger_id: i64,
    entry_id: i64,
    master_key: Bytes,
    body: Bytes,
    recovery: bool,
) -> RequestBody {
    RequestBody::Add {
        ledger_id,
        entry_id,
        master_key,
        body,
        flags: if recovery {
            RequestFlags::recovery_add()
        } else {
            RequestFlags::NONE
        },
    }
}

pub fn build_read_request(ledger_id: i64, entry_id: i64) -> RequestBody {
    RequestBody::Read {
        ledger_id,
        entry_id,
        master_key: None,
        flags: RequestFlags::NONE,
    }
}

pub fn build_fence_request(ledger_id: i64, entry_id: i64, master_key: Bytes) -> RequestBody {
    RequestBody::Read {
        ledger_id,
        entry_id,
        master_key: Some(master_key),
        flags: RequestFlags::fence_ledger(),
    }
}

/// 用一个已解码的响应驱动 `pending` 的结果处理：以 `ledger_id` 为键把
/// 用户回调调度到 `executor` 上，并向 `metrics` 记一笔延迟样本。调用时
/// 挂起操作已经从完成表中摘除，交付恰好一次回调的责任由调用方承担。
pub fn complete_with_response<Ctx: Send + 'static>(
    pending: PendingOp<Ctx>,
    response: ResponseBody,
    peer: bk_proto::PeerAddress,
    executor: &Arc<dyn OrderedExecutor>,
    metrics: &Arc<dyn MetricsSink>,
) {
    let op = pending.op_type();
    let mismatched = op != response.op();
    if mismatched {
        warn!(expected = %op, actual = %response.op(), "response op_type does not match pending request; failing the pending op instead of trusting its fields");
    }
    let latency = pending.started_at().elapsed();
    let rc = ClientErrorKind::from_status(response.status(), op);
    if rc.is_ok() && !mismatched {
        metrics.register_successful_event(op, latency);
    } else {
        metrics.register_failed_event(op, latency);
    }

    let ledger_key = pending.ledger_id() as u64;
    if mismatched {
        // 形状不对的响应仍然欠调用方恰好一次回调，用挂起操作自带的 id，
        // 不信任错误形状响应里的字段。
        let mismatch_rc = match op {
            bk_proto::OpType::AddEntry => ClientErrorKind::WriteFailure,
            bk_proto::OpType::ReadEntry => ClientErrorKind::NoSuchEntry,
        };
        let ledger_id = pending.ledger_id();
        let entry_id = pending.entry_id();
        match pending {
            PendingOp::Add { cb, ctx, .. } => {
                executor.submit_ordered(
                    ledger_key,
                    Box::new(move || cb(mismatch_rc, ledger_id, entry_id, peer, ctx)),
                );
            }
            PendingOp::Read { cb, ctx, .. } => {
                executor.submit_ordered(
                    ledger_key,
                    Box::new(move || cb(mismatch_rc, ledger_id, entry_id, None, ctx)),
                );
            }
        }
        return;
    }

    match pending {
        PendingOp::Add { cb, ctx, .. } => {
            let ResponseBody::Add {
                ledger_id,
                entry_id,
                ..
            } = response
            else {
                unreachable!("op equality checked above")
            };
            executor.submit_ordered(
                ledger_key,
                Box::new(move || {
                    cb(rc, ledger_id, entry_id, peer, ctx);
                }),
            );
        }
        PendingOp::Read { cb, ctx, .. } => {
            let ResponseBody::Read {
                ledger_id,
                entry_id,
                body,
                ..
            } = response
            else {
                unreachable!("op equality checked above")
            };
            let body = if rc.is_ok() { Some(body) } else { None };
            executor.submit_ordered(
                ledger_key,
                Box::new(move || {
                    cb(rc, ledger_id, entry_id, body, ctx);
                }),
            );
        }
    }
}

/// 在从未收到线缆响应的情况下（超时、断连、关闭，或本地写入失败）就地
/// 以 `kind` 判定 `pending` 失败。调度方式与真实响应完全一致地走有序
/// 执行器，因此不论请求以何种原因完成，单 ledger 的顺序都保持不变。
pub fn error_out<Ctx: Send + 'static>(
    txn_id: TxnId,
    pending: PendingOp<Ctx>,
    kind: ClientErrorKind,
    peer: bk_proto::PeerAddress,
    executor: &Arc<dyn OrderedExecutor>,
    metrics: &Arc<dyn MetricsSink>,
) {
    trace!(txn_id, kind = %kind, "failing pending op locally");
    let op = pending.op_type();
    let latency = pending.started_at().elapsed();
    metrics.register_failed_event(op, latency);
    let ledger_key = pending.ledger_id() as u64;
    match pending {
        PendingOp::Add {
            ledger_id,
            entry_id,
            cb,
            ctx,
            ..
        } => {
            executor.submit_ordered(
                ledger_key,
                Box::new(move || {
                    cb(kind, ledger_id, entry_id, peer, ctx);
                }),
            );
        }
        PendingOp::Read {
            ledger_id,
            entry_id,
            cb,
            ctx,
            ..
        } => {
            executor.submit_ordered(
                ledger_key,
                Box::new(move || {
                    cb(kind, ledger_id, entry_id, None, ctx);
                }),
            );
        }
    }
}

