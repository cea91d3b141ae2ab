use tracelink_core::{Endpoint, RxParser, RxStore, Timestamp, TxSource, clock};

use crate::{
    backpressure::{BackpressureState, TxStats},
    config::LinkConfig,
    connection::Connection,
    error::LinkError,
    pump::{self, DrainMode, TxPump},
};

/// 连接状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// 追踪通道：目标进程与采集端之间唯一的双工字节流。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 以一个显式持有的值替代进程级全局套接字，保持“每进程一条连接”的约定，
///   同时不引入隐藏的可变全局状态；
/// - 对外只暴露 `open/close/reset/flush_all/pump_once/receive_once/now`，
///   发送缓冲、接收缓冲与解析器均由调用方在每次调用时借入。
///
/// ## 逻辑（How）
/// - `open`：解析配置串并委托 [`Connection::open`]；若已连接，先完整拆除旧连接；
/// - `flush_all`/`pump_once`：共享同一发送泵，只在每次交付的块数上不同；
/// - `receive_once`：一次非阻塞读取并同步调用解析器；
/// - 收发泵在未连接时返回 [`LinkError::SocketUninitialized`]，不做其他事情。
///
/// ## 契约（What）
/// - 单线程协作式调用；若宿主在多个线程调用，需要在外部对整个 `TraceLink` 加锁；
/// - 本类型除 [`TraceLink::reset`] 外不会终止进程；
/// - 发送错误不会关闭连接，由调用方决定重连还是复位。
#[derive(Debug)]
pub struct TraceLink {
    config: LinkConfig,
    connection: Option<Connection>,
    backpressure: BackpressureState,
}

impl TraceLink {
    /// 以给定配置创建未连接的通道。
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            connection: None,
            backpressure: BackpressureState::new(),
        }
    }

    /// 按 `host[:service]` 配置串连接采集端；`None` 表示 `localhost:6601`。
    ///
    /// 只建立连接，不发送任何数据。连接前已写入发送缓冲的记录需要随后调用
    /// [`TraceLink::flush_all`] 推送，或直接使用 [`TraceLink::open_and_flush`]。
    pub fn open(&mut self, config: Option<&str>) -> Result<(), LinkError> {
        let endpoint = Endpoint::parse(config);
        self.open_endpoint(&endpoint)
    }

    /// 启动时序：连接采集端后立即排空发送缓冲，返回推送的字节数。
    ///
    /// 建连失败时不触碰发送缓冲；排空失败时连接保持打开。
    pub fn open_and_flush<S>(
        &mut self,
        config: Option<&str>,
        tx: &mut S,
    ) -> Result<usize, LinkError>
    where
        S: TxSource + ?Sized,
    {
        self.open(config)?;
        self.flush_all(tx)
    }

    /// 连接到已解析的采集端地址。
    pub fn open_endpoint(&mut self, endpoint: &Endpoint) -> Result<(), LinkError> {
        if let Some(previous) = &self.connection {
            tracing::warn!(
                previous = %previous.endpoint(),
                %endpoint,
                "link re-opened while connected; tearing down the previous connection"
            );
            self.close();
        }
        tracing::debug!(%endpoint, "connecting to collector");
        let connection = Connection::open(endpoint, &self.config)?;
        tracing::info!(%endpoint, peer = %connection.peer_addr(), "connected to collector");
        self.connection = Some(connection);
        Ok(())
    }

    /// 关闭连接；重复调用或从未打开时为空操作。
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::info!(endpoint = %connection.endpoint(), "disconnected from collector");
        }
    }

    /// 关闭连接并终止进程，仅用于追踪通道不可恢复的故障。
    pub fn reset(&mut self) -> ! {
        self.close();
        std::process::exit(0)
    }

    /// 排空发送缓冲中的全部数据，返回本轮发送的字节数。
    pub fn flush_all<S>(&mut self, tx: &mut S) -> Result<usize, LinkError>
    where
        S: TxSource + ?Sized,
    {
        self.drain(tx, DrainMode::All)
    }

    /// 只交付一块数据，供周期性调度使用。
    pub fn pump_once<S>(&mut self, tx: &mut S) -> Result<usize, LinkError>
    where
        S: TxSource + ?Sized,
    {
        self.drain(tx, DrainMode::Single)
    }

    /// 读取当前可用的命令字节并交给解析器，返回读取的字节数。
    pub fn receive_once<R, P>(&mut self, rx: &mut R, parser: &mut P) -> Result<usize, LinkError>
    where
        R: RxStore,
        P: RxParser + ?Sized,
    {
        let connection = Self::require(&mut self.connection)?;
        Ok(pump::receive(connection, rx, parser))
    }

    /// 当前单调时间戳。
    pub fn now(&self) -> Timestamp {
        clock::now()
    }

    pub fn state(&self) -> LinkState {
        if self.connection.is_some() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// 当前连接。
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// 发送路径的累计统计，跨越重连保留。
    pub fn stats(&self) -> TxStats {
        self.backpressure.snapshot()
    }

    fn drain<S>(&mut self, tx: &mut S, mode: DrainMode) -> Result<usize, LinkError>
    where
        S: TxSource + ?Sized,
    {
        let connection = Self::require(&mut self.connection)?;
        TxPump::new(connection, &self.config, &mut self.backpressure).drain(tx, mode)
    }

    fn require(connection: &mut Option<Connection>) -> Result<&mut Connection, LinkError> {
        connection.as_mut().ok_or_else(|| {
            tracing::error!("invalid TCP socket: pump invoked before open");
            LinkError::SocketUninitialized
        })
    }
}

impl Default for TraceLink {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Duration;
    use tracelink_core::{RxBuffer, TxRing};
    use tracing_test::traced_test;

    fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let config = format!("127.0.0.1:{}", listener.local_addr().expect("addr").port());
        (listener, config)
    }

    #[test]
    fn close_is_idempotent() {
        let mut link = TraceLink::default();
        link.close();
        link.close();
        assert_eq!(link.state(), LinkState::Disconnected);

        let (_listener, config) = listener();
        link.open(Some(&config)).expect("open");
        assert!(link.is_connected());
        link.close();
        link.close();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(link.connection().is_none());
    }

    #[test]
    #[traced_test]
    fn pumps_before_open_report_uninitialized_socket() {
        let mut link = TraceLink::default();
        let mut tx = TxRing::with_capacity(8);
        tx.push(b"queued");
        let mut rx = RxBuffer::default();
        let mut parser = |window: &[u8]| assert!(window.is_empty(), "nothing can be received");

        assert!(matches!(link.flush_all(&mut tx), Err(LinkError::SocketUninitialized)));
        assert!(matches!(link.pump_once(&mut tx), Err(LinkError::SocketUninitialized)));
        assert!(matches!(
            link.receive_once(&mut rx, &mut parser),
            Err(LinkError::SocketUninitialized)
        ));
        assert_eq!(tx.len(), 6);
        assert!(logs_contain("invalid TCP socket"));
    }

    #[test]
    #[traced_test]
    fn reopening_tears_down_previous_connection() {
        let (first, first_config) = listener();
        let (_second, second_config) = listener();
        let mut link = TraceLink::default();

        link.open(Some(&first_config)).expect("open first");
        let (mut accepted, _) = first.accept().expect("accept");
        link.open(Some(&second_config)).expect("open second");

        let mut buf = [0u8; 1];
        accepted
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        assert_eq!(accepted.read(&mut buf).expect("eof"), 0);
        assert_eq!(
            link.connection().map(|c| c.endpoint().to_string()),
            Some(second_config)
        );
        assert!(logs_contain("tearing down the previous connection"));
    }

    #[test]
    fn open_and_flush_pushes_records_queued_before_connecting() {
        let (listener, config) = listener();
        let mut tx = TxRing::with_capacity(64);
        tx.push(b"startup records");

        let mut link = TraceLink::default();
        let sent = link.open_and_flush(Some(&config), &mut tx).expect("open and flush");
        assert_eq!(sent, 15);
        assert!(tx.is_empty());

        let (mut accepted, _) = listener.accept().expect("accept");
        link.close();
        let mut received = Vec::new();
        accepted.read_to_end(&mut received).expect("read until close");
        assert_eq!(received, b"startup records");
    }

    #[test]
    fn open_and_flush_leaves_queue_untouched_when_connect_fails() {
        let mut tx = TxRing::with_capacity(8);
        tx.push(b"queued");
        let mut link = TraceLink::default();
        let err = link
            .open_and_flush(Some("127.0.0.1:not-a-port"), &mut tx)
            .expect_err("invalid service");
        assert!(matches!(err, LinkError::Resolution { .. }));
        assert_eq!(tx.len(), 6);
    }

    #[test]
    fn failed_open_leaves_link_disconnected() {
        let mut link = TraceLink::default();
        let err = link.open(Some("127.0.0.1:not-a-port")).expect_err("invalid service");
        assert_eq!(err.code(), "tracelink.transport.tcp.resolve_failed");
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn now_is_non_decreasing() {
        let link = TraceLink::default();
        let first = link.now();
        assert!(link.now() >= first);
    }
}
