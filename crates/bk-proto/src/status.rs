use crate::op::OpType;
use core::fmt;

/// 远端 bookie 在响应头部中返回的状态码。
///
/// `Unknown` 兜住客户端不认识的任何编码。到客户端错误分类的映射必须是
/// 全函数，因此未识别的编码在解码阶段被保留下来，而不是直接拒绝。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StatusCode {
    Ok,
    NoSuchEntry,
    NoSuchLedger,
    BadVersion,
    UnauthorizedAccess,
    Fenced,
    Unknown(i32),
}

impl StatusCode {
    pub fn from_wire(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            1 => StatusCode::NoSuchEntry,
            2 => StatusCode::NoSuchLedger,
            3 => StatusCode::BadVersion,
            4 => StatusCode::UnauthorizedAccess,
            5 => StatusCode::Fenced,
            other => StatusCode::Unknown(other),
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::NoSuchEntry => 1,
            StatusCode::NoSuchLedger => 2,
            StatusCode::BadVersion => 3,
            StatusCode::UnauthorizedAccess => 4,
            StatusCode::Fenced => 5,
            StatusCode::Unknown(other) => other,
        }
    }
}

/// 通过用户回调的 `rc` 参数交付的、客户端可见的结果。
///
/// 要么是 [`StatusCode`] 经 [`ClientErrorKind::from_status`] 映射而来，
/// 要么是一个从未触达线缆的纯客户端本地事件（超时、断连、关闭）。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ClientErrorKind {
    Ok,
    NoSuchEntry,
    ProtocolVersion,
    UnauthorizedAccess,
    LedgerFenced,
    WriteFailure,
    PeerUnavailable,
    RequestTimeout,
}

impl ClientErrorKind {
    /// 为给定操作把服务端状态码映射成客户端错误分类。
    ///
    /// 构造上即是全函数：`AddEntry` 遇到本 crate 不认识的状态落到
    /// `WriteFailure`；读操作没有对应的“未知状态”桶，统一归入最接近的
    /// 已命名分类，绝不会 panic。
    pub fn from_status(status: StatusCode, op: OpType) -> Self {
        match status {
            StatusCode::Ok => ClientErrorKind::Ok,
            StatusCode::NoSuchEntry | StatusCode::NoSuchLedger => ClientErrorKind::NoSuchEntry,
            StatusCode::BadVersion => ClientErrorKind::ProtocolVersion,
            StatusCode::UnauthorizedAccess => ClientErrorKind::UnauthorizedAccess,
            StatusCode::Fenced => ClientErrorKind::LedgerFenced,
            StatusCode::Unknown(_) => match op {
                OpType::AddEntry => ClientErrorKind::WriteFailure,
                OpType::ReadEntry => ClientErrorKind::NoSuchEntry,
            },
        }
    }

    /// 仅对唯一的成功变体为真；其余所有变体都是通过同一个回调槽位
    /// 交付的失败结果。
    pub const fn is_ok(self) -> bool {
        matches!(self, ClientErrorKind::Ok)
    }
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClientErrorKind::Ok => "ok",
            ClientErrorKind::NoSuchEntry => "no such entry",
            ClientErrorKind::ProtocolVersion => "protocol version mismatch",
            ClientErrorKind::UnauthorizedAccess => "unauthorized access",
            ClientErrorKind::LedgerFenced => "ledger fenced",
            ClientErrorKind::WriteFailure => "write failure",
            ClientErrorKind::PeerUnavailable => "peer unavailable",
            ClientErrorKind::RequestTimeout => "request timeout",
        };
        f.write_str(label)
    }
}
