//! [`bk_proto::Transport`] / [`bk_proto::TransportFactory`] 这道接缝的
//! Tokio TCP 实现：每个 bookie 对端一个已连接套接字，读写各自串行化，
//! 关闭时走一套优雅的半关闭流程。

mod channel;

pub use channel::{TcpChannel, TcpSocketConfig, TcpTransportFactory};
