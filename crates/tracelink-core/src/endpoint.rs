use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use thiserror::Error;

/// 未提供配置串时使用的采集端主机。
pub const DEFAULT_HOST: &str = "localhost";

/// 配置串缺少 `:service` 时使用的采集端服务端口。
pub const DEFAULT_SERVICE: &str = "6601";

/// 主机名的最大字节数，对应 128 字节（含终止符）的主机名缓冲。
pub const MAX_HOST_LEN: usize = 127;

/// 采集端地址 `{host, service}`。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 将启动参数 `host[:service]` 一次性解析为结构化地址，连接管理器此后只与
///   该结构交互，不再重复切分字符串；
/// - 缺省值集中在本模块，保证“无配置 → `localhost:6601`”的约定只有一个来源。
///
/// ## 逻辑（How）
/// - [`Endpoint::parse`] 在第一个 `:` 处切分，之前为主机、之后为服务；
/// - 主机超过 [`MAX_HOST_LEN`] 时在 UTF-8 字符边界截断，绝不越界；
/// - [`Endpoint::resolve_v4`] 调用系统地址查询并仅保留 IPv4 候选。
///
/// ## 契约（What）
/// - 解析是纯函数，没有失败路径，截断是唯一的退化情形；
/// - 服务字段原样保留（可能为空或非数字），是否可用由解析阶段判定；
/// - **限制**：服务只接受十进制端口号，不查询服务名数据库，`host:qspy` 之类的
///   具名服务在 [`Endpoint::resolve_v4`] 中返回 [`ResolveError::InvalidService`]。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    service: String,
}

impl Endpoint {
    /// 直接以主机与服务构造，主机同样受长度上限约束。
    pub fn new(host: impl AsRef<str>, service: impl Into<String>) -> Self {
        Self {
            host: truncate_host(host.as_ref()).to_owned(),
            service: service.into(),
        }
    }

    /// 解析 `host[:service]` 配置串；`None` 表示使用缺省主机与服务。
    pub fn parse(config: Option<&str>) -> Self {
        let raw = config.unwrap_or(DEFAULT_HOST);
        match raw.split_once(':') {
            Some((host, service)) => Self::new(host, service),
            None => Self::new(raw, DEFAULT_SERVICE),
        }
    }

    /// 主机部分。
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 服务部分。
    pub fn service(&self) -> &str {
        &self.service
    }

    /// 服务部分按十进制端口解释的结果。
    pub fn port(&self) -> Option<u16> {
        self.service.parse().ok()
    }

    /// 将地址解析为按系统返回顺序排列的 IPv4 候选列表。
    ///
    /// - 服务必须是十进制端口号，否则返回 [`ResolveError::InvalidService`]；
    /// - 系统查询失败返回 [`ResolveError::Lookup`]；
    /// - 查询成功但没有任何 IPv4 地址时返回 [`ResolveError::NoCandidates`]，
    ///   调用方因此无需处理空列表。
    pub fn resolve_v4(&self) -> Result<Vec<SocketAddr>, ResolveError> {
        let port = self.port().ok_or_else(|| ResolveError::InvalidService {
            service: self.service.clone(),
        })?;
        let candidates: Vec<SocketAddr> = (self.host.as_str(), port)
            .to_socket_addrs()
            .map_err(ResolveError::Lookup)?
            .filter(SocketAddr::is_ipv4)
            .collect();
        if candidates.is_empty() {
            return Err(ResolveError::NoCandidates);
        }
        Ok(candidates)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::parse(None)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.service)
    }
}

/// 地址解析失败的原因。
#[derive(Debug, Error)]
pub enum ResolveError {
    /// 服务字段不是合法的十进制端口。
    #[error("service `{service}` is not a numeric port")]
    InvalidService { service: String },
    /// 系统地址查询失败。
    #[error("address lookup failed: {0}")]
    Lookup(#[source] io::Error),
    /// 查询成功但没有返回 IPv4 地址。
    #[error("lookup returned no IPv4 address")]
    NoCandidates,
}

fn truncate_host(host: &str) -> &str {
    if host.len() <= MAX_HOST_LEN {
        return host;
    }
    let mut end = MAX_HOST_LEN;
    while !host.is_char_boundary(end) {
        end -= 1;
    }
    &host[..end]
}
