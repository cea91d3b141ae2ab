use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use tracelink_core::Endpoint;

use crate::{config::LinkConfig, error::LinkError, pump::LinkIo};

/// 已建立的非阻塞 TCP 连接。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 独占唯一的套接字句柄，收发泵只能经由本类型访问套接字，不另存句柄；
/// - 建连、切换非阻塞与套接字选项设置集中在 [`Connection::open`]，失败时按
///   “先清理、再返回”的顺序提前退出。
///
/// ## 逻辑（How）
/// 1. [`Endpoint::resolve_v4`] 得到 IPv4 候选，无结果即 [`LinkError::Resolution`]；
/// 2. 依序为每个候选创建套接字并同步建连，失败的尝试立即关闭并继续下一个；
///    全部失败返回 [`LinkError::Connection`]；
/// 3. 切换为非阻塞模式，失败时套接字随 `Socket` 析构关闭，再返回
///    [`LinkError::Configuration`]；
/// 4. 尽力设置 `SO_REUSEADDR`、`SO_LINGER` 与可选的 `SO_SNDBUF`，失败只记录告警。
///
/// ## 契约（What）
/// - 返回的连接已处于非阻塞模式，可立即交给收发泵；
/// - 析构即关闭描述符，不存在“半打开”状态。
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    endpoint: Endpoint,
    peer_addr: SocketAddr,
}

impl Connection {
    /// 解析并连接采集端。
    pub fn open(endpoint: &Endpoint, config: &LinkConfig) -> Result<Self, LinkError> {
        let candidates = endpoint
            .resolve_v4()
            .map_err(|source| LinkError::Resolution {
                endpoint: endpoint.clone(),
                source,
            })?;

        let (socket, peer_addr) = connect_first(endpoint, &candidates, config)?;

        if let Err(err) = socket.set_nonblocking(true) {
            tracing::error!(%endpoint, error = %err, "failed to set non-blocking socket");
            return Err(LinkError::Configuration(err));
        }
        apply_best_effort_options(&socket, config);

        Ok(Self {
            stream: TcpStream::from(socket),
            endpoint: endpoint.clone(),
            peer_addr,
        })
    }

    /// 建连时使用的采集端地址。
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// 实际连接的对端地址。
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// 本地地址。
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }
}

impl LinkIo for Connection {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

/// 依序尝试候选地址，返回第一个既能创建套接字又能建连成功的结果。
fn connect_first(
    endpoint: &Endpoint,
    candidates: &[SocketAddr],
    config: &LinkConfig,
) -> Result<(Socket, SocketAddr), LinkError> {
    let mut last_error = None;
    for (attempt, addr) in candidates.iter().enumerate() {
        match connect_one(*addr, config) {
            Ok(socket) => return Ok((socket, *addr)),
            Err(err) => {
                tracing::debug!(
                    %endpoint,
                    candidate = %addr,
                    attempt = attempt + 1,
                    error = %err,
                    "collector candidate refused connection"
                );
                last_error = Some(err);
            }
        }
    }
    tracing::error!(%endpoint, attempts = candidates.len(), "cannot connect to collector");
    Err(LinkError::Connection {
        endpoint: endpoint.clone(),
        attempts: candidates.len(),
        source: last_error,
    })
}

fn connect_one(addr: SocketAddr, config: &LinkConfig) -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    let target = SockAddr::from(addr);
    match config.connect_timeout() {
        Some(timeout) => socket.connect_timeout(&target, timeout)?,
        None => socket.connect(&target)?,
    }
    Ok(socket)
}

fn apply_best_effort_options(socket: &Socket, config: &LinkConfig) {
    let sock = SockRef::from(socket);
    if let Err(err) = sock.set_reuse_address(config.reuse_address()) {
        tracing::warn!(error = %err, "failed to configure SO_REUSEADDR");
    }
    if let Err(err) = sock.set_linger(config.linger()) {
        tracing::warn!(error = %err, "failed to configure SO_LINGER");
    }
    if let Some(size) = config.send_buffer_size()
        && let Err(err) = sock.set_send_buffer_size(size)
    {
        tracing::warn!(size, error = %err, "failed to configure SO_SNDBUF");
    }
}
