//! Line client for poking at the server by hand.
//!
//! Reads whitespace-separated tokens from stdin and sends each one as it is read.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::io::{self, BufRead, Write};
use std::net::{Ipv4Addr, TcpStream};

#[derive(Parser)]
#[command(name = "sockmux-client")]
#[command(about = "Send stdin tokens to a sockmux server", long_about = None)]
struct Cli {
    #[arg(long, default_value_t = Ipv4Addr::LOCALHOST)]
    host: Ipv4Addr,

    #[arg(short, long, default_value_t = sockmux::config::DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sockmux_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut stream = TcpStream::connect((cli.host, cli.port))?;
    tracing::info!(peer = %stream.peer_addr()?, "connected");

    for line in io::stdin().lock().lines() {
        for token in line?.split_whitespace() {
            match stream.write_all(token.as_bytes()) {
                Ok(()) => tracing::info!("send: {token}"),
                Err(error) => tracing::warn!(%error, "send error"),
            }
        }
    }

    Ok(())
}
