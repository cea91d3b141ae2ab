use std::time::{Duration, Instant};

/// 发送路径的累计统计快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxStats {
    /// 套接字已接收的字节数。
    pub bytes_sent: u64,
    /// 完整交付的块数。
    pub chunks_delivered: u64,
    /// 遭遇 `WouldBlock` 的次数。
    pub would_block: u64,
    /// 部分写入的次数。
    pub partial_writes: u64,
    /// 致命发送错误的次数。
    pub send_failures: u64,
}

/// 管理发送泵的背压统计。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 记录连续 `WouldBlock` 的次数与起始时间，在对端持续停滞时输出一次诊断日志，
///   避免每 10 ms 一条的日志风暴；
/// - 同时累计 [`TxStats`]，供宿主观测发送路径的健康度。
///
/// ## 逻辑 (How)
/// - `on_would_block` 累加连续计数，跨过 `STALL_LOG_THRESHOLD` 时记录一次 `debug`；
/// - 任意字节被接收（`on_sent`）即视为停滞结束，连续计数清零；
/// - `on_failure` 计入失败并同样结束当前停滞。
///
/// ## 契约 (What)
/// - 只在持有连接的同一线程内调用，不做内部同步；
/// - 计数使用饱和加法，不会溢出或倒退。
#[derive(Debug, Default)]
pub(crate) struct BackpressureState {
    consecutive_would_block: u32,
    stall_started: Option<Instant>,
    totals: TxStats,
}

impl BackpressureState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 记录一次 `WouldBlock`，返回当前连续次数。
    pub(crate) fn on_would_block(&mut self) -> u32 {
        let now = Instant::now();
        self.stall_started.get_or_insert(now);
        self.consecutive_would_block = self.consecutive_would_block.saturating_add(1);
        self.totals.would_block = self.totals.would_block.saturating_add(1);
        if self.consecutive_would_block == STALL_LOG_THRESHOLD {
            tracing::debug!(
                retries = self.consecutive_would_block,
                stalled_for = ?self.stalled_for(now),
                "collector is not draining the trace stream; holding the current chunk"
            );
        }
        self.consecutive_would_block
    }

    /// 记录套接字接收了 `len` 字节；`partial` 表示本次写入短于请求长度。
    pub(crate) fn on_sent(&mut self, len: usize, partial: bool) {
        if len > 0 {
            self.end_stall();
        }
        self.totals.bytes_sent = self.totals.bytes_sent.saturating_add(len as u64);
        if partial {
            self.totals.partial_writes = self.totals.partial_writes.saturating_add(1);
        }
    }

    pub(crate) fn on_chunk_delivered(&mut self) {
        self.totals.chunks_delivered = self.totals.chunks_delivered.saturating_add(1);
    }

    pub(crate) fn on_failure(&mut self) {
        self.end_stall();
        self.totals.send_failures = self.totals.send_failures.saturating_add(1);
    }

    pub(crate) fn snapshot(&self) -> TxStats {
        self.totals
    }

    fn stalled_for(&self, now: Instant) -> Duration {
        self.stall_started
            .map(|start| now.duration_since(start))
            .unwrap_or_default()
    }

    fn end_stall(&mut self) {
        self.consecutive_would_block = 0;
        self.stall_started = None;
    }
}

const STALL_LOG_THRESHOLD: u32 = 100;
