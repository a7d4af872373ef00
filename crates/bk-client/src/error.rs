use thiserror::Error;

/// 同步 API 的错误面：只有调用参数违规与生命周期误用才会走到这里。
/// 每个请求自身的成功或失败结果一律通过该请求的回调交付，绝不经过
/// 这个类型。
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// `close()` 已经执行过；此后每个公开方法都同步地以此失败。
    #[error("peer client is closed")]
    Closed,

    /// `add_entry` 与 `read_entry_and_fence` 都要求非空的 `master_key`。
    #[error("master key must not be empty for {op}")]
    MissingMasterKey { op: &'static str },
}
