#![deny(unsafe_code)]
#![doc = r#"
# tracelink-tcp

## 设计动机（Why）
- **定位**：追踪通道在宿主侧的 TCP 传输实现，把发送缓冲中的追踪记录可靠地推送给
  远端采集端，并把采集端下发的命令字节交给解析器。
- **架构角色**：对接 `tracelink-core` 的地址、时间戳与缓冲契约，本身不做记录编码，
  只搬运不透明的字节块。
- **设计理念**：非阻塞套接字配合有界睡眠重试，在不丢失、不乱序、不重复的前提下，
  保证生产方单次被阻塞的时长有上界。

## 核心契约（What）
- [`TraceLink`]：`open`/`open_and_flush`/`close`/`reset`/`flush_all`/`pump_once`/`receive_once`/`now`；
- [`Connection`]：唯一的套接字句柄，负责建连、非阻塞模式与套接字选项；
- [`LinkError`]：解析、建连、配置、发送与未初始化五类失败，均带稳定错误码；
- **前置约束**：单线程协作式调度，本 crate 不创建线程，也不拥有调度循环。

## 实现策略（How）
- 建连使用 `socket2` 逐个尝试 IPv4 候选，成功后转为标准库 `TcpStream`；
- 发送泵显式维护“在途块 + 已发送偏移”，`WouldBlock` 与部分写入都重试同一剩余部分；
- 接收泵一次读取至多接收缓冲容量的字节，随后同步调用解析器。

## 风险与考量（Trade-offs）
- 停滞但不报错的采集端没有总时长上限，完整性优先于时延；
- 对端断开不会在接收路径上报告，而是通过后续发送失败暴露；
- 断线后不会自动重连，需要宿主再次调用 `open`。
"#]

mod backpressure;
mod config;
mod connection;
mod error;
mod link;
mod pump;

pub use backpressure::TxStats;
pub use config::{DEFAULT_RETRY_INTERVAL, DEFAULT_TX_CHUNK, LinkConfig};
pub use connection::Connection;
pub use error::LinkError;
pub use link::{LinkState, TraceLink};
pub use pump::LinkIo;
