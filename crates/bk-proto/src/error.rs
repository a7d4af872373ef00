use thiserror::Error;

/// 连接级致命的线缆层错误。
///
/// 两个变体都由连接状态机吞掉处理：记录日志、拆除传输，任何挂起的完成
/// 项最终以 [`crate::status::ClientErrorKind::PeerUnavailable`] 的形式
/// 交付给调用方。二者都不会以 `Err` 的形式从公开的、基于回调的 API
/// 中逃逸出去。
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("frame length exceeds MAX_FRAME_LENGTH")]
    FrameTooLarge,
    #[error("frame payload failed schema decoding")]
    CorruptFrame,
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
}
