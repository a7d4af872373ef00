use async_trait::async_trait;
use bk_proto::{PeerAddress, PeerClientConfig, Transport, TransportFactory};
use bytes::{Bytes, BytesMut};
use socket2::SockRef;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

/// 连接建立时一次性落地的套接字级配置项。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 把“是否关闭 Nagle 算法、是否开启 TCP keepalive”这两条内核行为
///   显式配置化，避免调用方直接摆弄 `TcpStream`/`socket2` 的细节；
/// - 与 [`bk_proto::PeerClientConfig`] 解耦：上层只配置语义化的超时与
///   开关，真正落到套接字选项的转换集中在这一个类型里。
///
/// ## 核心逻辑（How）
/// - `apply` 在连接建立后立即调用一次，先设 `TCP_NODELAY`，再通过
///   `socket2::SockRef` 设 keepalive；
/// - 两者都是“设置一次，连接存续期间不再变更”的一次性配置，没有运行时
///   热更新路径。
///
/// ## 契约说明（What）
/// - `with_no_delay`/`with_keep_alive`：输入布尔值，返回更新后的配置；
/// - `From<&PeerClientConfig>`：把客户端配置里对应的两个字段原样转换
///   过来，是连接路径上构造本类型的唯一入口。
///
/// ## 设计取舍（Trade-offs）
/// 目前只封装这两个选项；`SO_LINGER`、`SO_RCVBUF` 等更细的调优项一旦
/// 有真实需求，可以照此结构继续往上加字段，不影响已有调用方。
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpSocketConfig {
    no_delay: bool,
    keep_alive: bool,
}

impl TcpSocketConfig {
    pub fn new() -> Self {
        Self {
            no_delay: true,
            keep_alive: true,
        }
    }

    pub fn with_no_delay(mut self, value: bool) -> Self {
        self.no_delay = value;
        self
    }

    pub fn with_keep_alive(mut self, value: bool) -> Self {
        self.keep_alive = value;
        self
    }

    fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.no_delay)?;
        let sock = SockRef::from(stream);
        sock.set_keepalive(self.keep_alive)
    }
}

impl From<&PeerClientConfig> for TcpSocketConfig {
    fn from(config: &PeerClientConfig) -> Self {
        Self::new()
            .with_no_delay(config.tcp_no_delay())
            .with_keep_alive(config.keep_alive())
    }
}

struct ChannelInner {
    stream: AsyncMutex<TcpStream>,
    peer_addr: PeerAddress,
}

/// 到某个 bookie 对端的一条有序字节流。
///
/// 读写都通过同一把 `tokio::sync::Mutex` 串行化；上层的连接状态机从不
/// 并发发起多个读或多个写，因此这把锁在实践中从不竞争。
#[derive(Clone)]
pub struct TcpChannel {
    inner: Arc<ChannelInner>,
}

impl TcpChannel {
    fn new(stream: TcpStream, peer_addr: PeerAddress) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                stream: AsyncMutex::new(stream),
                peer_addr,
            }),
        }
    }

    async fn connect_with_config(
        addr: PeerAddress,
        config: TcpSocketConfig,
    ) -> io::Result<Self> {
        let stream = TcpStream::connect(addr.socket_addr()).await?;
        config.apply(&stream)?;
        Ok(Self::new(stream, addr))
    }
}

#[async_trait]
impl Transport for TcpChannel {
    async fn read(&self, max: usize) -> io::Result<Bytes> {
        let mut guard = self.inner.stream.lock().await;
        let mut buf = BytesMut::zeroed(max);
        let n = guard.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf.freeze())
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut guard = self.inner.stream.lock().await;
        guard.write_all(data).await?;
        guard.flush().await
    }

    /// 先发送 FIN，再把对端剩余的数据读空直到 EOF，而不是直接丢弃套接字。
    async fn shutdown(&self) -> io::Result<()> {
        let mut guard = self.inner.stream.lock().await;
        AsyncWriteExt::shutdown(&mut *guard).await?;
        match read_until_eof(&mut guard).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(
                    peer = %self.inner.peer_addr,
                    error = %err,
                    "peer did not close cleanly after shutdown"
                );
                Ok(())
            }
        }
    }

    fn peer_addr(&self) -> PeerAddress {
        self.inner.peer_addr
    }
}

async fn read_until_eof(stream: &mut TcpStream) -> io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(_) => continue,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// 产出 [`TcpChannel`]。本 crate 唯一随附的
/// [`bk_proto::TransportFactory`] 实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpTransportFactory;

#[async_trait]
impl TransportFactory for TcpTransportFactory {
    async fn connect(
        &self,
        addr: PeerAddress,
        config: &PeerClientConfig,
    ) -> io::Result<Box<dyn Transport>> {
        let channel = TcpChannel::connect_with_config(addr, TcpSocketConfig::from(config)).await?;
        Ok(Box::new(channel))
    }
}
