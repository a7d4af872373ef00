//! 单对端 RPC 客户端：把 `add_entry`/`read_entry` 请求复用到通往单个
//! 远端 bookie 的一条有序 TCP 流上，再把完成结果通过有序执行器分派回
//! 调用方回调，由执行器保证同一 ledger 上的回调顺序。
//!
//! # 体系定位（Architecture）
//! - `client` 是门面与胶水层，持有状态机、完成表、路由器三者共用的
//!   `Arc<Core<Ctx>>`；
//! - `state` 管理“未连接/连接中/已连接”三态切换与并发连接请求的合并；
//! - `completion` 是并发完成表，`router` 负责构造请求体与分派响应；
//! - `ordered_executor` 提供默认的每-ledger 有序回调执行器；
//! - `sweeper` 周期性地把过期的挂起请求以超时失败收尾。

mod client;
mod completion;
mod error;
mod ordered_executor;
mod router;
mod state;
mod sweeper;

pub use client::{PeerClient, PeerClientBuilder};
pub use completion::{AddCallback, ReadCallback};
pub use error::ClientError;
pub use ordered_executor::TokioOrderedExecutor;

pub use bk_proto::{ClientErrorKind, PeerAddress, PeerClientConfig};
