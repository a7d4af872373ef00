//! 请求/响应负载的编解码。
//!
//! # 设计动机（Why）
//! - 负载 schema 通常由外部代码生成器产出；本模块充当该生成层的具体
//!   落地，手写一套定长字段的二进制格式，因为本工作区的依赖栈里没有
//!   引入 schema 编译器；
//! - 换取的好处是格式完全透明，不依赖额外的构建步骤即可阅读、调试。

use crate::error::ProtoError;
use crate::op::{OpType, RequestFlags};
use crate::status::StatusCode;
use crate::txn::TxnId;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const WIRE_VERSION: u8 = 1;
const TAG_ADD_ENTRY: u8 = 1;
const TAG_READ_ENTRY: u8 = 2;

/// 请求与响应共用的头部：`{ version, op_type, txn_id }`。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub version: u8,
    pub op: OpType,
    pub txn_id: TxnId,
}

fn put_bytes_field(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

fn get_bytes_field(buf: &mut Bytes) -> Result<Bytes, ProtoError> {
    if buf.remaining() < 4 {
        return Err(ProtoError::CorruptFrame);
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(ProtoError::CorruptFrame);
    }
    Ok(buf.copy_to_bytes(len))
}

fn op_tag(op: OpType) -> u8 {
    match op {
        OpType::AddEntry => TAG_ADD_ENTRY,
        OpType::ReadEntry => TAG_READ_ENTRY,
    }
}

fn op_from_tag(tag: u8) -> Result<OpType, ProtoError> {
    match tag {
        TAG_ADD_ENTRY => Ok(OpType::AddEntry),
        TAG_READ_ENTRY => Ok(OpType::ReadEntry),
        _ => Err(ProtoError::CorruptFrame),
    }
}

/// 仅出站方向的请求负载，指向单个 ledger 条目。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RequestBody {
    Add {
        ledger_id: i64,
        entry_id: i64,
        master_key: Bytes,
        body: Bytes,
        flags: RequestFlags,
    },
    Read {
        ledger_id: i64,
        entry_id: i64,
        master_key: Option<Bytes>,
        flags: RequestFlags,
    },
}

impl RequestBody {
    pub fn op(&self) -> OpType {
        match self {
            RequestBody::Add { .. } => OpType::AddEntry,
            RequestBody::Read { .. } => OpType::ReadEntry,
        }
    }
}

/// 仅入站方向的响应负载。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResponseBody {
    Add {
        status: StatusCode,
        ledger_id: i64,
        entry_id: i64,
    },
    Read {
        status: StatusCode,
        ledger_id: i64,
        entry_id: i64,
        body: Bytes,
    },
}

impl ResponseBody {
    pub fn op(&self) -> OpType {
        match self {
            ResponseBody::Add { .. } => OpType::AddEntry,
            ResponseBody::Read { .. } => OpType::ReadEntry,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ResponseBody::Add { status, .. } => *status,
            ResponseBody::Read { status, .. } => *status,
        }
    }

    pub fn ledger_id(&self) -> i64 {
        match self {
            ResponseBody::Add { ledger_id, .. } => *ledger_id,
            ResponseBody::Read { ledger_id, .. } => *ledger_id,
        }
    }

    pub fn entry_id(&self) -> i64 {
        match self {
            ResponseBody::Add { entry_id, .. } => *entry_id,
            ResponseBody::Read { entry_id, .. } => *entry_id,
        }
    }
}

/// 将 `{ header, body }` 编码进一块新缓冲区（尚未加上帧长度前缀，
/// 该步骤在 [`crate::frame`] 中完成）。
pub fn encode_request(txn_id: TxnId, body: &RequestBody) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u8(WIRE_VERSION);
    buf.put_u8(op_tag(body.op()));
    buf.put_u64(txn_id);
    match body {
        RequestBody::Add {
            ledger_id,
            entry_id,
            master_key,
            body,
            flags,
        } => {
            buf.put_i64(*ledger_id);
            buf.put_i64(*entry_id);
            buf.put_u8(flags.bits());
            put_bytes_field(&mut buf, master_key);
            put_bytes_field(&mut buf, body);
        }
        RequestBody::Read {
            ledger_id,
            entry_id,
            master_key,
            flags,
        } => {
            buf.put_i64(*ledger_id);
            buf.put_i64(*entry_id);
            buf.put_u8(flags.bits());
            match master_key {
                Some(key) => {
                    buf.put_u8(1);
                    put_bytes_field(&mut buf, key);
                }
                None => buf.put_u8(0),
            }
        }
    }
    buf.freeze()
}

pub fn decode_request(mut payload: Bytes) -> Result<(Header, RequestBody), ProtoError> {
    if payload.remaining() < 10 {
        return Err(ProtoError::CorruptFrame);
    }
    let version = payload.get_u8();
    let op = op_from_tag(payload.get_u8())?;
    let txn_id = payload.get_u64();
    if payload.remaining() < 17 {
        return Err(ProtoError::CorruptFrame);
    }
    let ledger_id = payload.get_i64();
    let entry_id = payload.get_i64();
    let flags = RequestFlags::from_bits(payload.get_u8());
    let body = match op {
        OpType::AddEntry => {
            let master_key = get_bytes_field(&mut payload)?;
            let body = get_bytes_field(&mut payload)?;
            RequestBody::Add {
                ledger_id,
                entry_id,
                master_key,
                body,
                flags,
            }
        }
        OpType::ReadEntry => {
            if payload.remaining() < 1 {
                return Err(ProtoError::CorruptFrame);
            }
            let master_key = if payload.get_u8() == 1 {
                Some(get_bytes_field(&mut payload)?)
            } else {
                None
            };
            RequestBody::Read {
                ledger_id,
                entry_id,
                master_key,
                flags,
            }
        }
    };
    Ok((
        Header {
            version,
            op,
            txn_id,
        },
        body,
    ))
}

pub fn encode_response(txn_id: TxnId, body: &ResponseBody) -> Bytes {
    let mut buf = BytesMut::with_capacity(32);
    buf.put_u8(WIRE_VERSION);
    buf.put_u8(op_tag(body.op()));
    buf.put_u64(txn_id);
    buf.put_i32(body.status().to_wire());
    buf.put_i64(body.ledger_id());
    buf.put_i64(body.entry_id());
    if let ResponseBody::Read { body, .. } = body {
        put_bytes_field(&mut buf, body);
    }
    buf.freeze()
}

pub fn decode_response(mut payload: Bytes) -> Result<(Header, ResponseBody), ProtoError> {
    if payload.remaining() < 10 {
        return Err(ProtoError::CorruptFrame);
    }
    let version = payload.get_u8();
    let op = op_from_tag(payload.get_u8())?;
    let txn_id = payload.get_u64();
    if payload.remaining() < 20 {
        return Err(ProtoError::CorruptFrame);
    }
    let status = StatusCode::from_wire(payload.get_i32());
    let ledger_id = payload.get_i64();
    let entry_id = payload.get_i64();
    let body = match op {
        OpType::AddEntry => ResponseBody::Add {
            status,
            ledger_id,
            entry_id,
        },
        OpType::ReadEntry => {
            let body = get_bytes_field(&mut payload)?;
            ResponseBody::Read {
                status,
                ledger_id,
                entry_id,
                body,
            }
        }
    };
    Ok((
        Header {
            version,
            op,
            txn_id,
        },
        body,
    ))
}
