use std::fmt;
use std::net::SocketAddr;

/// 标识远端 bookie 的不可变网络端点，同时在回调中用作来源标签。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PeerAddress(SocketAddr);

impl PeerAddress {
    pub const fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub const fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
