//! 定长前缀分帧：4 字节大端长度，后跟等长的协议负载。
//!
//! # 核心逻辑（How）
//! - `encode_frame` 只做拼接，不关心负载的具体 schema；
//! - `try_decode_frame` 采用“先看长度前缀、够了再切负载”的两段式解析，
//!   使得调用方可以把任意粒度到达的字节不断喂给同一个缓冲区。

use crate::error::ProtoError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// 解码器接受的最大负载长度。
///
/// 声明长度一旦超过该值就立即拒绝，不必等待帧体真正到达；这类帧视为
/// 连接级致命错误，而非可恢复的局部失败。
pub const MAX_FRAME_LENGTH: usize = 2 * 1024 * 1024;

const LENGTH_PREFIX_BYTES: usize = 4;

/// 给已编码好的负载加上长度前缀。
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// 尝试从 `buf` 中取出一帧完整的负载。
///
/// # 契约说明（What）
/// - 若 `buf` 尚未凑齐一帧，返回 `Ok(None)`；调用方应继续从传输层读取
///   更多字节后重试；
/// - 解析成功时，已消费的字节从 `buf` 中移除；
/// - 只要长度前缀可读，一旦其声明值超过 [`MAX_FRAME_LENGTH`]，立即返回
///   错误，即便帧体尚未全部到达也不等待。
pub fn try_decode_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtoError> {
    if buf.remaining() < LENGTH_PREFIX_BYTES {
        return Ok(None);
    }
    let len = u32::from_be_bytes(buf[..LENGTH_PREFIX_BYTES].try_into().unwrap()) as usize;
    if len > MAX_FRAME_LENGTH {
        return Err(ProtoError::FrameTooLarge);
    }
    if buf.remaining() < LENGTH_PREFIX_BYTES + len {
        return Ok(None);
    }
    buf.advance(LENGTH_PREFIX_BYTES);
    Ok(Some(buf.split_to(len).freeze()))
}
