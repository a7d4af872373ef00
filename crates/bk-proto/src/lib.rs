//! 线缆层契约：协议数据类型、帧编解码与错误分类，供对端客户端
//! （`bk-client`）与其具体传输实现（如 `bk-transport-tcp`）共同依赖。
//!
//! # 设计动机（Why）
//! - 客户端内核与传输实现分属不同 crate，需要一个不含 I/O 的中立契约层，
//!   避免二者互相依赖对方的内部类型；
//! - 将“如何编码一个请求”与“通过什么连接发送它”彻底分离，使得替换传输
//!   实现（例如未来的 TLS 变体）不触及任何编解码逻辑。
//!
//! # 体系定位（Architecture）
//! - 本 crate 不做任何 I/O，只定义帧格式、消息体、状态码映射与
//!   `Transport`/`OrderedExecutor`/`MetricsSink` 等扩展点 trait；
//! - `bk-client` 依赖本 crate 驱动状态机与完成表，`bk-transport-tcp`
//!   依赖本 crate 实现具体的 `Transport`。

mod config;
mod error;
mod executor;
mod frame;
mod message;
mod metrics;
mod op;
mod peer;
mod status;
mod transport;
mod txn;

pub use config::PeerClientConfig;
pub use error::ProtoError;
pub use executor::{OrderedExecutor, OrderedTask};
pub use frame::{encode_frame, try_decode_frame, MAX_FRAME_LENGTH};
pub use message::{
    decode_request, decode_response, encode_request, encode_response, Header, RequestBody,
    ResponseBody,
};
pub use metrics::{MetricsSink, NoopMetricsSink};
pub use op::{OpType, RequestFlags, LAST_ADD_CONFIRMED};
pub use peer::PeerAddress;
pub use status::{ClientErrorKind, StatusCode};
pub use transport::{Transport, TransportFactory};
pub use txn::{TxnId, TxnIdGenerator};
