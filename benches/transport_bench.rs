//! Benchmarks for TCP and UDP relay request handling.
//!
//! Measures end-to-end relay latency against a mock DNS-over-TCP upstream
//! with simulated latency of ~15ms average and ±5ms jitter.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::runtime::Runtime;

use dnsbridge::frame::read_frame;
use dnsbridge::inspect::NoopInspector;
use dnsbridge::{Relay, RelayConfig, UdpReplySizing, UpstreamConfig};

const PROXY_PORT: u16 = 15354;
const UPSTREAM_ADDR: &str = "127.0.0.1:15356";

/// Simulated upstream latency (based on real-world DNS benchmarks)
const BASE_LATENCY_MS: u64 = 15;
const JITTER_MS: u64 = 5;

fn build_dns_query() -> Vec<u8> {
    let mut query = Vec::new();
    query.extend_from_slice(&[0x12, 0x34]); // Query ID
    query.extend_from_slice(&[0x01, 0x00]); // Flags: standard query
    query.extend_from_slice(&[0x00, 0x01]); // Questions: 1
    query.extend_from_slice(&[0x00, 0x00]); // Answer RRs: 0
    query.extend_from_slice(&[0x00, 0x00]); // Authority RRs: 0
    query.extend_from_slice(&[0x00, 0x00]); // Additional RRs: 0
    // Query for "example.com"
    query.extend_from_slice(&[0x07]);
    query.extend_from_slice(b"example");
    query.extend_from_slice(&[0x03]);
    query.extend_from_slice(b"com");
    query.extend_from_slice(&[0x00]);
    query.extend_from_slice(&[0x00, 0x01]); // Type: A
    query.extend_from_slice(&[0x00, 0x01]); // Class: IN
    query
}

fn build_tcp_dns_query() -> Vec<u8> {
    dnsbridge::frame::encode(&build_dns_query()).unwrap()
}

fn build_tcp_dns_response() -> Vec<u8> {
    let mut response = build_dns_query();
    response[2] = 0x81; // Response flag
    response[3] = 0x80; // Recursion available
    response[7] = 0x01; // Answer count
    response.extend_from_slice(&[0xc0, 0x0c]); // Name pointer
    response.extend_from_slice(&[0x00, 0x01]); // Type: A
    response.extend_from_slice(&[0x00, 0x01]); // Class: IN
    response.extend_from_slice(&[0x00, 0x00, 0x01, 0x2c]); // TTL: 300
    response.extend_from_slice(&[0x00, 0x04]); // Data length: 4
    response.extend_from_slice(&[93, 184, 216, 34]);
    dnsbridge::frame::encode(&response).unwrap()
}

/// Simulate realistic upstream latency with jitter
async fn simulate_upstream_latency() {
    let jitter = rand::rng().random_range(0..=JITTER_MS * 2);
    let latency = BASE_LATENCY_MS - JITTER_MS + jitter;
    tokio::time::sleep(Duration::from_millis(latency)).await;
}

/// Mock DNS-over-TCP upstream with simulated latency
async fn mock_upstream(listener: TcpListener) {
    let response = build_tcp_dns_response();
    loop {
        if let Ok((mut stream, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                if let Ok(Some(_)) = read_frame(&mut stream).await {
                    simulate_upstream_latency().await;
                    let _ = stream.write_all(&response).await;
                }
            });
        }
    }
}

fn start_mock_upstream() {
    let upstream_addr: SocketAddr = UPSTREAM_ADDR.parse().unwrap();

    std::thread::spawn(move || {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let listener = TcpListener::bind(upstream_addr).await.unwrap();
            mock_upstream(listener).await;
        });
    });

    std::thread::sleep(Duration::from_millis(50));
}

fn start_relay() -> (SocketAddr, SocketAddr) {
    let upstream_addr: SocketAddr = UPSTREAM_ADDR.parse().unwrap();
    let config = RelayConfig {
        listen_host: "127.0.0.1".to_string(),
        listen_port: PROXY_PORT,
        upstream: UpstreamConfig {
            host: upstream_addr.ip().to_string(),
            port: upstream_addr.port(),
            timeout: Duration::from_secs(5),
        },
        udp_reply: UdpReplySizing::Declared,
    };
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let relay = Relay::bind_with_inspector(&config, Arc::new(NoopInspector))
                .await
                .unwrap()
                .start()
                .unwrap();
            tx.send((relay.udp_addr().unwrap(), relay.tcp_addr().unwrap()))
                .unwrap();

            std::future::pending::<()>().await;
        });
    });

    rx.recv().unwrap()
}

fn bench_requests(c: &mut Criterion) {
    start_mock_upstream();
    let (udp_addr, tcp_addr) = start_relay();

    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("relay");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("tcp", "latency"), |b| {
        b.to_async(&rt).iter(|| async {
            let mut client = TcpStream::connect(tcp_addr).await.unwrap();
            client.write_all(&build_tcp_dns_query()).await.unwrap();
            read_frame(&mut client).await.unwrap().unwrap().len()
        });
    });

    group.bench_function(BenchmarkId::new("udp", "latency"), |b| {
        b.to_async(&rt).iter(|| async {
            let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            client.send_to(&build_dns_query(), udp_addr).await.unwrap();

            let mut buf = [0u8; 4096];
            tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap()
                .0
        });
    });

    group.finish();
}

criterion_group!(benches, bench_requests);
criterion_main!(benches);
