//! 发送/接收缓冲契约与参考实现。
//!
//! 传输层只借用缓冲中的字节，不复制、不重新分配；记录编码与命令解析由外部协作者完成。

use std::ops::Range;

/// 默认发送缓冲容量（8 KiB）。
pub const DEFAULT_TX_CAPACITY: usize = 8 * 1024;

/// 默认接收缓冲容量（2 KiB）。
pub const DEFAULT_RX_CAPACITY: usize = 2 * 1024;

/// 发送缓冲：按“借出连续块 → 确认已发送字节”的两段式协议向传输层供数。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 发送泵需要在部分写入与 `WouldBlock` 之间反复重试同一块数据，借出的切片在
///   确认之前必须保持不变；
/// - 将“取块”与“确认”拆开，使致命发送错误发生时尚未被套接字接收的字节仍留在
///   缓冲中，重连后可以原样续发。
///
/// ## 契约（What）
/// - `request_chunk(max_len)`：返回最多 `max_len` 字节的连续块，没有数据时返回 `None`；
///   重复调用且中间没有 `commit` 时返回同一块的前缀；
/// - `commit(len)`：确认最近借出块的前 `len` 字节已交付，`len` 不得超过该块长度；
/// - **前置条件**：单线程调用，借出的切片在下一次调用前失效。
pub trait TxSource {
    /// 借出下一块待发送字节。
    fn request_chunk(&mut self, max_len: usize) -> Option<&[u8]>;

    /// 确认已交付的字节数。
    fn commit(&mut self, len: usize);
}

/// 接收缓冲：暴露底层存储，并由传输层设置可读窗口。
///
/// 解析器可以只消费窗口的一部分，剩余字节属于尚未完整到达的命令；传输层在下一次
/// 读取前调用 [`RxStore::compact`] 把它们移到存储起点，新数据只写入其后的空闲区。
pub trait RxStore {
    /// 整个底层存储，长度即声明容量。
    fn storage_mut(&mut self) -> &mut [u8];

    /// 将可读窗口设置为 `window`（相对存储起点）。
    fn set_readable(&mut self, window: Range<usize>);

    /// 当前可读窗口。
    fn readable(&self) -> &[u8];

    /// 从窗口头部消费 `len` 字节。
    fn consume(&mut self, len: usize);

    /// 把未消费的字节移到存储起点，窗口变为 `[0, n)`，返回 `n`。
    fn compact(&mut self) -> usize;
}

/// 命令解析器：消费接收缓冲中已设置的可读窗口。
pub trait RxParser {
    /// 解析当前窗口内的全部字节。
    fn parse_available(&mut self, rx: &mut dyn RxStore);
}

impl<F> RxParser for F
where
    F: FnMut(&[u8]),
{
    fn parse_available(&mut self, rx: &mut dyn RxStore) {
        let len = {
            let window = rx.readable();
            self(window);
            window.len()
        };
        rx.consume(len);
    }
}

/// 环形发送缓冲。
///
/// `request_chunk` 只返回物理连续的部分；跨越存储末尾的数据分两次借出。
/// 缓冲写满时 `push` 只接受能容纳的前缀，溢出策略由写入方决定。
#[derive(Debug)]
pub struct TxRing {
    storage: Box<[u8]>,
    tail: usize,
    len: usize,
}

impl TxRing {
    /// 以给定容量创建，容量为零时按 1 处理。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity.max(1)].into_boxed_slice(),
            tail: 0,
            len: 0,
        }
    }

    /// 写入字节，返回实际接受的数量。
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes.len().min(self.free());
        let capacity = self.capacity();
        let mut head = (self.tail + self.len) % capacity;
        let mut rest = &bytes[..accepted];
        while !rest.is_empty() {
            let run = rest.len().min(capacity - head);
            self.storage[head..head + run].copy_from_slice(&rest[..run]);
            head = (head + run) % capacity;
            rest = &rest[run..];
        }
        self.len += accepted;
        accepted
    }

    /// 容量。
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// 待发送字节数。
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否没有待发送数据。
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 剩余可写空间。
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }
}

impl Default for TxRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TX_CAPACITY)
    }
}

impl TxSource for TxRing {
    fn request_chunk(&mut self, max_len: usize) -> Option<&[u8]> {
        if self.len == 0 || max_len == 0 {
            return None;
        }
        let contiguous = self.len.min(self.capacity() - self.tail).min(max_len);
        Some(&self.storage[self.tail..self.tail + contiguous])
    }

    fn commit(&mut self, len: usize) {
        debug_assert!(len <= self.len, "commit beyond queued data");
        let len = len.min(self.len);
        self.tail = (self.tail + len) % self.capacity();
        self.len -= len;
    }
}

/// 平坦接收缓冲，读入的数据总是从存储起点开始。
#[derive(Debug)]
pub struct RxBuffer {
    storage: Box<[u8]>,
    window: Range<usize>,
}

impl RxBuffer {
    /// 以给定容量创建。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity].into_boxed_slice(),
            window: 0..0,
        }
    }

    /// 声明容量。
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}

impl Default for RxBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RX_CAPACITY)
    }
}

impl RxStore for RxBuffer {
    fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    fn set_readable(&mut self, window: Range<usize>) {
        let end = window.end.min(self.storage.len());
        self.window = window.start.min(end)..end;
    }

    fn readable(&self) -> &[u8] {
        &self.storage[self.window.clone()]
    }

    fn consume(&mut self, len: usize) {
        self.window.start = (self.window.start + len).min(self.window.end);
    }

    fn compact(&mut self) -> usize {
        let pending = self.window.len();
        if self.window.start > 0 {
            self.storage.copy_within(self.window.clone(), 0);
        }
        self.window = 0..pending;
        pending
    }
}
