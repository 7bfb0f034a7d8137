use clap::Parser;
use sockmux::{EventQueuePoller, LogObserver, PollPoller, SelectPoller, ServerBuilder, Strategy};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sockmux")]
#[command(about = "Single-threaded TCP server multiplexing connections with select, poll or an event queue", long_about = None)]
struct Cli {
    /// Readiness strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::EventQueue)]
    strategy: Strategy,

    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    host: Ipv4Addr,

    #[arg(short, long, default_value_t = sockmux::config::DEFAULT_PORT)]
    port: u16,

    /// Accept backlog (defaults to SOMAXCONN)
    #[arg(long)]
    backlog: Option<i32>,

    /// Readiness wait timeout in milliseconds (defaults per strategy)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum simultaneous connections (defaults per strategy)
    #[arg(long)]
    max_connections: Option<usize>,

    /// Use blocking sockets after readiness, like the classic servers
    #[arg(long)]
    blocking: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sockmux=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut builder = ServerBuilder::new()
        .host(cli.host)
        .port(cli.port)
        .nonblocking(!cli.blocking);

    if let Some(backlog) = cli.backlog {
        builder = builder.backlog(backlog);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(max_connections) = cli.max_connections {
        builder = builder.max_connections(max_connections);
    }

    tracing::info!(strategy = %cli.strategy, port = cli.port, "starting");

    match cli.strategy {
        Strategy::Select => builder.build::<SelectPoller, _>(LogObserver)?.run(),
        Strategy::Poll => builder.build::<PollPoller, _>(LogObserver)?.run(),
        Strategy::EventQueue => builder.build::<EventQueuePoller, _>(LogObserver)?.run(),
    }
}
