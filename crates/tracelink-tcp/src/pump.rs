//! 发送泵与接收泵。
//!
//! 两个泵都由外部调度器同步调用，本模块不创建线程；唯一的挂起点是发送泵在
//! 背压时的有界睡眠。

use std::io;
use std::thread;

use tracelink_core::{RxParser, RxStore, TxSource};

use crate::{
    backpressure::BackpressureState,
    config::LinkConfig,
    error::{LinkError, is_transient},
};

/// 收发泵所需的最小套接字能力。
///
/// [`Connection`](crate::Connection) 以非阻塞 TCP 套接字实现；语义与
/// `send(2)`/`recv(2)` 一致：暂时无法收发时返回 `ErrorKind::WouldBlock`。
pub trait LinkIo {
    /// 写入至多 `buf.len()` 字节，返回实际写入数。
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// 读取至多 `buf.len()` 字节，返回实际读取数。
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// 每次调用排空的块数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DrainMode {
    /// 持续请求直到发送缓冲报告无数据。
    All,
    /// 只交付一块，限制单次调用的时延。
    Single,
}

/// 正在发送的块：借用的切片加上已被套接字接收的偏移。
struct InFlight<'a> {
    chunk: &'a [u8],
    sent: usize,
}

impl<'a> InFlight<'a> {
    fn new(chunk: &'a [u8]) -> Self {
        Self { chunk, sent: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.chunk[self.sent..]
    }

    fn advance(&mut self, len: usize) {
        self.sent = (self.sent + len).min(self.chunk.len());
    }

    fn is_delivered(&self) -> bool {
        self.sent == self.chunk.len()
    }
}

/// 发送泵。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 非阻塞套接字配合有界睡眠重试：既不会因采集端缓慢而无限期阻塞目标进程，
///   也不会在等待发送缓冲空间时空转 CPU；
/// - “全部排空”与“单块”两种调用共享完全相同的重试语义，差别只在每次调用交付的块数。
///
/// ## 逻辑（How）
/// 1. 以 `tx_chunk` 为上限向发送缓冲请求一块；没有数据则结束本轮；
/// 2. 写入剩余部分：
///    - `WouldBlock`：睡眠 `retry_interval` 后重试**同一**剩余部分，不取新块；
///    - `Interrupted`：立即重试；
///    - 其他错误：中止本轮并返回 [`LinkError::Send`]；
///    - 写入字节少于请求：睡眠后推进偏移，继续发送余下部分；
/// 3. 整块交付后回到步骤 1（`Single` 模式在此返回）。
///
/// ## 契约（What）
/// - 每次写入后只向发送缓冲确认已被套接字接收的字节，致命错误时未发送的部分仍留在缓冲中，
///   重连后原样续发，既不跳过也不重复；
/// - 返回本轮被套接字接收的总字节数。
pub(crate) struct TxPump<'a, I: ?Sized> {
    io: &'a mut I,
    config: &'a LinkConfig,
    backpressure: &'a mut BackpressureState,
}

impl<'a, I> TxPump<'a, I>
where
    I: LinkIo + ?Sized,
{
    pub(crate) fn new(
        io: &'a mut I,
        config: &'a LinkConfig,
        backpressure: &'a mut BackpressureState,
    ) -> Self {
        Self {
            io,
            config,
            backpressure,
        }
    }

    pub(crate) fn drain<S>(&mut self, tx: &mut S, mode: DrainMode) -> Result<usize, LinkError>
    where
        S: TxSource + ?Sized,
    {
        let mut delivered = 0;
        loop {
            let (sent, outcome) = match tx.request_chunk(self.config.tx_chunk()) {
                Some(chunk) if !chunk.is_empty() => {
                    let mut in_flight = InFlight::new(chunk);
                    let outcome = self.deliver(&mut in_flight);
                    (in_flight.sent, outcome)
                }
                _ => break,
            };
            tx.commit(sent);
            delivered += sent;
            outcome?;
            if mode == DrainMode::Single {
                break;
            }
        }
        Ok(delivered)
    }

    fn deliver(&mut self, in_flight: &mut InFlight<'_>) -> Result<(), LinkError> {
        while !in_flight.is_delivered() {
            let requested = in_flight.remaining().len();
            match self.io.send(in_flight.remaining()) {
                Ok(sent) => {
                    let partial = sent < requested;
                    self.backpressure.on_sent(sent.min(requested), partial);
                    if partial {
                        self.pause();
                    }
                    in_flight.advance(sent);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    self.backpressure.on_would_block();
                    self.pause();
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.backpressure.on_failure();
                    tracing::error!(
                        error = %err,
                        unsent = in_flight.remaining().len(),
                        "sending data over TCP failed"
                    );
                    return Err(LinkError::Send(err));
                }
            }
        }
        self.backpressure.on_chunk_delivered();
        Ok(())
    }

    fn pause(&self) {
        let interval = self.config.retry_interval();
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
}

/// 接收泵：一次非阻塞读取，新数据追加在上一轮未消费的字节之后，随后同步调用解析器。
///
/// - 读取前先 [`RxStore::compact`]，只向其后的空闲区读取，绝不覆盖未消费的字节；
///   空闲区为零时本轮不读取；
/// - 读到零字节、`WouldBlock` 或其他读取错误都视为本轮无事可做；对端断开由后续发送失败暴露。
///
/// 返回本轮新读取的字节数。
pub(crate) fn receive<I, R, P>(io: &mut I, rx: &mut R, parser: &mut P) -> usize
where
    I: LinkIo + ?Sized,
    R: RxStore,
    P: RxParser + ?Sized,
{
    let pending = rx.compact();
    let storage = rx.storage_mut();
    let Some(free) = storage.get_mut(pending..).filter(|free| !free.is_empty()) else {
        tracing::debug!(pending, "receive buffer full; parser has not consumed pending bytes");
        return 0;
    };
    let received = match io.recv(free) {
        Ok(received) => received.min(free.len()),
        Err(err) if is_transient(&err) => 0,
        Err(err) => {
            tracing::debug!(error = %err, "receive failed; nothing to parse this round");
            0
        }
    };
    if received == 0 {
        return 0;
    }
    rx.set_readable(0..pending + received);
    parser.parse_available(rx);
    received
}
