//! Server configuration and per-strategy defaults.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

/// Port the demonstration server listens on when none is given.
pub const DEFAULT_PORT: u16 = 3333;

/// Payload bytes read per receive (one byte of the 1024-byte buffer is reserved).
pub const DEFAULT_CHUNK_SIZE: usize = 1023;

/// Ready events collected by one event-queue wait.
pub const DEFAULT_EVENTS_CAPACITY: usize = 64;

/// Readiness-notification strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Strategy {
    /// Descriptor-set scan (`select`).
    Select,
    /// Pollable-array scan (`poll`).
    Poll,
    /// Kernel event queue (`epoll` or `kqueue`).
    #[value(alias = "epoll", alias = "kqueue")]
    EventQueue,
}

impl Strategy {
    pub fn default_timeout(self) -> Duration {
        match self {
            Strategy::Select => Duration::from_secs(5),
            Strategy::Poll | Strategy::EventQueue => Duration::from_secs(10),
        }
    }

    /// Connection bound of the bounded-array strategies.
    pub fn default_max_connections(self) -> Option<usize> {
        match self {
            Strategy::Select => Some(128),
            // 4000 array slots, one of them holds the listener.
            Strategy::Poll => Some(3999),
            Strategy::EventQueue => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Select => "select",
            Strategy::Poll => "poll",
            Strategy::EventQueue => "event-queue",
        };
        f.write_str(name)
    }
}

/// Everything the event loop needs to know at startup.
///
/// `nonblocking` decides whether a spurious readiness report can stall the whole
/// loop: with non-blocking sockets a stale `accept` or `recv` returns
/// `WouldBlock` and is dropped for that tick, with blocking sockets it waits in
/// the kernel like the classic C servers do.
#[derive(Debug, Clone)]
pub struct Config {
    pub strategy: Strategy,
    pub host: Ipv4Addr,
    pub port: u16,
    pub backlog: i32,
    pub timeout: Duration,
    pub max_connections: Option<usize>,
    pub chunk_size: usize,
    pub events_capacity: usize,
    pub nonblocking: bool,
}

impl Config {
    pub fn for_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            host: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            backlog: libc::SOMAXCONN,
            timeout: strategy.default_timeout(),
            max_connections: strategy.default_max_connections(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            nonblocking: true,
        }
    }

    pub fn address(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_strategy(Strategy::EventQueue)
    }
}
