use crate::config::PeerClientConfig;
use crate::peer::PeerAddress;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;

/// 到单个对端的全双工有序字节流。
///
/// # 体系定位（Architecture）
/// 具体的套接字与网络传输原语藏在本 trait 之后，作为外部协作方；这是
/// 连接状态机编程所面向的接缝，客户端内核自身从不直接提及
/// `TcpStream` 这类具体类型。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 读取当前可用的数据，最多 `max` 字节；干净 EOF 时返回空 `Bytes`。
    async fn read(&self, max: usize) -> io::Result<Bytes>;

    /// 写完整个缓冲区，内部对短写循环重试。
    async fn write_all(&self, data: &[u8]) -> io::Result<()>;

    async fn shutdown(&self) -> io::Result<()>;

    fn peer_addr(&self) -> PeerAddress;
}

/// 为目标端点产出一个已连接的 [`Transport`]，遵循每连接选项
/// （`read_timeout`、`tcp_no_delay`、`keep_alive`）。
///
/// `connect` 本身不带读超时；限定一次连接尝试的时长是调用方
/// （连接状态机）的职责。
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(
        &self,
        addr: PeerAddress,
        config: &PeerClientConfig,
    ) -> io::Result<Box<dyn Transport>>;
}
