use std::io;

use thiserror::Error;
use tracelink_core::{Endpoint, ResolveError};

/// 追踪通道的统一错误类型。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 把建连、配置与发送阶段的失败归纳为少量稳定分类，调用方据此决定重试、
///   重连或调用 [`TraceLink::reset`](crate::TraceLink::reset)；
/// - 每个变体携带稳定错误码，日志与运维脚本无需解析底层 `errno` 文案。
///
/// ## 契约（What）
/// - 瞬时背压（`WouldBlock`/`Interrupted`）在发送泵内部吸收，不会以本类型出现；
/// - 除 [`LinkError::SocketUninitialized`] 外，存在底层原因时均以 `#[source]` 保留；
/// - 返回错误时，缓冲状态只包含已经完整收发的部分，不存在半更新。
#[derive(Debug, Error)]
pub enum LinkError {
    /// 地址解析失败，`open` 终止。
    #[error("cannot resolve collector {endpoint}: {source}")]
    Resolution {
        endpoint: Endpoint,
        #[source]
        source: ResolveError,
    },
    /// 所有候选地址都无法建立连接。
    #[error("cannot connect to collector {endpoint} ({attempts} candidate(s) tried)")]
    Connection {
        endpoint: Endpoint,
        attempts: usize,
        #[source]
        source: Option<io::Error>,
    },
    /// 切换非阻塞模式失败；返回前套接字已关闭。
    #[error("socket configuration failed: {0}")]
    Configuration(#[source] io::Error),
    /// 非瞬时的发送错误；本轮中止，连接保持打开由调用方处置。
    #[error("sending data over TCP failed: {0}")]
    Send(#[source] io::Error),
    /// 在成功 `open` 之前调用了收发泵。
    #[error("invalid TCP socket: link is not open")]
    SocketUninitialized,
}

impl LinkError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::Resolution { .. } => "tracelink.transport.tcp.resolve_failed",
            LinkError::Connection { .. } => "tracelink.transport.tcp.connect_failed",
            LinkError::Configuration(_) => "tracelink.transport.tcp.configure_failed",
            LinkError::Send(_) => "tracelink.transport.tcp.send_failed",
            LinkError::SocketUninitialized => "tracelink.transport.tcp.uninitialized",
        }
    }

    /// 稍后以相同参数重试是否可能成功。
    ///
    /// 对端暂不可达或连接被重置属于可重试；解析出的服务非法、配置失败与调用时序错误不是。
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Resolution { source, .. } => matches!(source, ResolveError::Lookup(_)),
            LinkError::Connection { .. } => true,
            LinkError::Configuration(_) | LinkError::SocketUninitialized => false,
            LinkError::Send(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::TimedOut
            ),
        }
    }
}

/// 瞬时错误：发送泵睡眠后重试同一块，接收泵视为本轮无数据。
pub(crate) fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
