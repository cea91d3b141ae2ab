//! 回环端到端测试：以本机监听器扮演采集端，验证追踪流的完整性与命令回传。
//!
//! # 测试目标（Why）
//! - 在真实内核套接字上确认发送泵遇到背压时不丢字节、不乱序；
//! - 确认致命发送错误后重连可以续发剩余数据；
//! - 确认接收泵每轮读取不超过接收缓冲容量。

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tracelink_core::{RxBuffer, TxRing};
use tracelink_tcp::{LinkConfig, LinkError, TraceLink};

/// 采集端监听器：缩小接收缓冲，让慢速读取更快地把背压传回发送方。
fn collector(preferred: &str) -> (TcpListener, String) {
    let bind = |addr: SocketAddr| -> std::io::Result<TcpListener> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_recv_buffer_size(4 * 1024)?;
        socket.bind(&addr.into())?;
        socket.listen(4)?;
        Ok(socket.into())
    };
    let listener = bind(preferred.parse().expect("addr"))
        .or_else(|_| bind("127.0.0.1:0".parse().expect("addr")))
        .expect("bind collector");
    let port = listener.local_addr().expect("local addr").port();
    (listener, format!("127.0.0.1:{port}"))
}

/// 接受一条连接并以慢速读取直到 EOF。
fn slow_reader(listener: TcpListener) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut received = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => panic!("collector read failed: {err}"),
            }
            thread::sleep(Duration::from_millis(2));
        }
        received
    })
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn digest(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

fn backpressured_config() -> LinkConfig {
    LinkConfig::new()
        .with_tx_chunk(1024)
        .with_send_buffer_size(Some(4 * 1024))
        .with_connect_timeout(Some(Duration::from_secs(5)))
}

#[test]
fn flush_all_delivers_every_byte_through_a_slow_collector() {
    let (listener, config) = collector("127.0.0.1:55001");
    let reader = slow_reader(listener);

    let payload = pattern(20_000);
    let mut tx = TxRing::with_capacity(32 * 1024);
    assert_eq!(tx.push(&payload), payload.len());

    let mut link = TraceLink::new(backpressured_config());
    link.open(Some(&config)).expect("open");
    let sent = link.flush_all(&mut tx).expect("flush");
    link.close();

    assert_eq!(sent, payload.len());
    assert!(tx.is_empty());
    let stats = link.stats();
    assert_eq!(stats.bytes_sent, 20_000);
    assert!(stats.chunks_delivered >= 20);

    let received = reader.join().expect("collector thread");
    assert_eq!(received.len(), payload.len());
    assert_eq!(digest(&received), digest(&payload));
}

#[test]
fn periodic_pumping_keeps_order_while_records_are_produced() {
    let (listener, config) = collector("127.0.0.1:0");
    let reader = slow_reader(listener);

    let payload = pattern(12_000);
    let mut tx = TxRing::with_capacity(4 * 1024);
    let mut link = TraceLink::new(backpressured_config());
    link.open(Some(&config)).expect("open");

    let mut produced = 0;
    while produced < payload.len() || !tx.is_empty() {
        let end = (produced + 700).min(payload.len());
        produced += tx.push(&payload[produced..end]);
        link.pump_once(&mut tx).expect("pump");
    }
    link.close();

    let received = reader.join().expect("collector thread");
    assert_eq!(digest(&received), digest(&payload));
}

#[test]
fn fatal_send_error_keeps_data_for_the_next_connection() {
    let (first, first_config) = collector("127.0.0.1:0");
    let mut link = TraceLink::new(LinkConfig::new().with_tx_chunk(1024));
    link.open(Some(&first_config)).expect("open first");

    // 采集端以 RST 方式断开。
    let (peer, _) = first.accept().expect("accept");
    SockRef::from(&peer)
        .set_linger(Some(Duration::ZERO))
        .expect("linger");
    drop(peer);
    thread::sleep(Duration::from_millis(100));

    let payload = pattern(8_000);
    let mut tx = TxRing::with_capacity(16 * 1024);
    tx.push(&payload);

    let err = link.flush_all(&mut tx).expect_err("peer reset");
    assert!(matches!(err, LinkError::Send(_)), "unexpected error: {err}");
    assert!(err.is_retryable());
    assert!(link.is_connected());
    assert_eq!(tx.len(), payload.len());

    let (second, second_config) = collector("127.0.0.1:0");
    let reader = slow_reader(second);
    link.open(Some(&second_config)).expect("reconnect");
    link.flush_all(&mut tx).expect("resume");
    link.close();

    let received = reader.join().expect("collector thread");
    assert_eq!(digest(&received), digest(&payload));
}

#[test]
fn receive_pump_hands_commands_to_parser_within_capacity() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let config = format!("127.0.0.1:{}", listener.local_addr().expect("addr").port());
    let commands = pattern(3_000);
    let to_send = commands.clone();
    let writer = thread::spawn(move || {
        let (mut stream, _): (TcpStream, _) = listener.accept().expect("accept");
        stream.write_all(&to_send).expect("write commands");
        stream
    });

    let mut link = TraceLink::default();
    link.open(Some(&config)).expect("open");
    let _collector = writer.join().expect("writer thread");

    let mut rx = RxBuffer::with_capacity(1024);
    let mut parsed = Vec::new();
    let mut rounds = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while parsed.len() < commands.len() && Instant::now() < deadline {
        let mut parser = |window: &[u8]| parsed.extend_from_slice(window);
        let received = link.receive_once(&mut rx, &mut parser).expect("receive");
        if received == 0 {
            thread::sleep(Duration::from_millis(5));
        } else {
            rounds.push(received);
        }
    }

    assert_eq!(parsed, commands);
    assert!(rounds.iter().all(|&len| len <= 1024));
    assert!(rounds.len() >= 3);
}

#[test]
fn unreachable_collector_fails_to_open() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let mut link = TraceLink::default();
    let err = link
        .open(Some(&format!("127.0.0.1:{port}")))
        .expect_err("nothing listens");
    assert!(matches!(err, LinkError::Connection { attempts: 1, .. }));
    assert!(!link.is_connected());
}
