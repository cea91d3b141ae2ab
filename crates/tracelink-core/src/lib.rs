#![deny(unsafe_code)]
#![doc = r#"
# tracelink-core

## 设计动机（Why）
- **定位**：追踪通道在宿主侧的契约层，集中定义“采集端地址”“单调时间戳”
  与“收发缓冲”三类与套接字无关的概念。
- **架构角色**：`tracelink-tcp` 依赖本 crate 完成连接建立与收发泵；记录编码器与
  命令解析器同样只需依赖本 crate 即可与传输层对接。

## 核心契约（What）
- [`Endpoint`]：由 `host[:service]` 配置串派生的采集端地址，可解析为 IPv4 候选；
- [`Timestamp`] / [`clock::now`]：以 0.1 微秒为单位的单调计数；
- [`TxSource`] / [`RxStore`] / [`RxParser`]：外部发送缓冲、接收缓冲与解析器的接口，
  并附带参考实现 [`TxRing`] 与 [`RxBuffer`]。

## 风险与考量（Trade-offs）
- 本 crate 不创建任何套接字，解析仅调用系统地址查询；
- 缓冲实现面向单线程协作式调度，不提供内部同步。
"#]

pub mod buffer;
pub mod clock;
pub mod endpoint;

pub use buffer::{RxBuffer, RxParser, RxStore, TxRing, TxSource};
pub use clock::{MonotonicClock, Timestamp};
pub use endpoint::{Endpoint, ResolveError};
