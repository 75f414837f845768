use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use dnsbridge::config::{DNS_PORT, RelayConfig, UdpReplySizing, UpstreamConfig};

#[derive(Parser)]
#[command(name = "dnsbridge")]
#[command(version, about = "Transparent DNS relay to a DNS-over-TCP upstream", long_about = None)]
struct Args {
    /// Local port to listen on (UDP and TCP)
    #[arg(short, long, default_value_t = DNS_PORT)]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "localhost")]
    bind: String,

    /// Upstream DNS resolver host
    #[arg(short, long, default_value = "1.1.1.1")]
    upstream: String,

    /// Upstream DNS resolver port
    #[arg(long, default_value_t = DNS_PORT)]
    upstream_port: u16,

    /// Deadline for one upstream exchange, in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Length of UDP replies
    #[arg(long, value_enum, default_value_t = ReplyLength::MatchQuery)]
    udp_reply: ReplyLength,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReplyLength {
    /// Cut or pad the reply to the query's length
    MatchQuery,
    /// Use the length declared by the upstream
    Declared,
}

impl From<ReplyLength> for UdpReplySizing {
    fn from(value: ReplyLength) -> Self {
        match value {
            ReplyLength::MatchQuery => UdpReplySizing::MatchQuery,
            ReplyLength::Declared => UdpReplySizing::Declared,
        }
    }
}

impl From<Args> for RelayConfig {
    fn from(args: Args) -> Self {
        RelayConfig {
            listen_host: args.bind,
            listen_port: args.port,
            upstream: UpstreamConfig {
                host: args.upstream,
                port: args.upstream_port,
                timeout: Duration::from_millis(args.timeout_ms),
            },
            udp_reply: args.udp_reply.into(),
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(dnsbridge::proxy::run(args.into()))?;

    Ok(())
}
