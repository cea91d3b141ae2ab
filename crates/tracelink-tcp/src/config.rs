use std::time::Duration;

/// 发送泵每次向发送缓冲请求的最大块长度（8 KiB）。
pub const DEFAULT_TX_CHUNK: usize = 8 * 1024;

/// `WouldBlock` 或部分写入后的重试间隔。
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// 追踪通道的连接与收发参数。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 将发送块大小、重试节奏与套接字选项集中成一个只读配置，连接管理器与发送泵
///   共享同一份取值；
/// - 避免调用方直接操作 `socket2` 或平台常量。
///
/// ## 契约（What）
/// - `tx_chunk`：每次 `request_chunk` 的上限，至少为 1；
/// - `retry_interval`：每次重试前的睡眠时长，也是发送泵单次阻塞的上界；
/// - `connect_timeout`：单个候选地址同步建连的上限，`None` 为阻塞直到内核返回；
/// - `reuse_address`/`linger`：建连后尽力设置的 `SO_REUSEADDR` 与 `SO_LINGER`，
///   `linger = None` 表示关闭 linger；
/// - `send_buffer_size`：可选的 `SO_SNDBUF`，同样尽力而为。
///
/// ## 注意事项（Trade-offs）
/// - 发送泵没有总时长上限，停滞但未报错的对端只受缓冲容量与重试节奏约束；
/// - `SO_LINGER` 在 Linux 上按秒取整。
#[derive(Clone, Debug)]
pub struct LinkConfig {
    tx_chunk: usize,
    retry_interval: Duration,
    connect_timeout: Option<Duration>,
    reuse_address: bool,
    linger: Option<Duration>,
    send_buffer_size: Option<usize>,
}

impl LinkConfig {
    /// 默认配置。
    pub const fn new() -> Self {
        Self {
            tx_chunk: DEFAULT_TX_CHUNK,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            connect_timeout: None,
            reuse_address: true,
            linger: None,
            send_buffer_size: None,
        }
    }

    /// 设置发送块上限，零按 1 处理。
    pub fn with_tx_chunk(mut self, tx_chunk: usize) -> Self {
        self.tx_chunk = tx_chunk.max(1);
        self
    }

    /// 设置重试间隔。
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// 设置单个候选地址的建连超时。
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 设置是否启用 `SO_REUSEADDR`。
    pub fn with_reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }

    /// 设置 `SO_LINGER`。
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// 设置 `SO_SNDBUF`。
    pub fn with_send_buffer_size(mut self, size: Option<usize>) -> Self {
        self.send_buffer_size = size;
        self
    }

    pub fn tx_chunk(&self) -> usize {
        self.tx_chunk
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn reuse_address(&self) -> bool {
        self.reuse_address
    }

    pub fn linger(&self) -> Option<Duration> {
        self.linger
    }

    pub fn send_buffer_size(&self) -> Option<usize> {
        self.send_buffer_size
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}
