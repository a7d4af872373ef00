use std::time::Duration;

/// 客户端内核与传输工厂读取的已解析配置项。
///
/// 文件/环境变量解析不在本结构的职责范围内，那是外部协作方的工作；
/// 本结构只承载解析完成后的最终取值，供 crate 内其余部分直接读取。
#[derive(Clone, Copy, Debug)]
pub struct PeerClientConfig {
    request_timeout: Duration,
    read_timeout: Duration,
    timeout_task_interval: Duration,
    tcp_no_delay: bool,
    keep_alive: bool,
}

impl PeerClientConfig {
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn with_request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn with_read_timeout(mut self, value: Duration) -> Self {
        self.read_timeout = value;
        self
    }

    pub fn timeout_task_interval(&self) -> Duration {
        self.timeout_task_interval
    }

    pub fn with_timeout_task_interval(mut self, value: Duration) -> Self {
        self.timeout_task_interval = value;
        self
    }

    pub fn tcp_no_delay(&self) -> bool {
        self.tcp_no_delay
    }

    pub fn with_tcp_no_delay(mut self, value: bool) -> Self {
        self.tcp_no_delay = value;
        self
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn with_keep_alive(mut self, value: bool) -> Self {
        self.keep_alive = value;
        self
    }
}

impl Default for PeerClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            timeout_task_interval: Duration::from_millis(500),
            tcp_no_delay: true,
            keep_alive: true,
        }
    }
}
