//! The dispatch loop.
//!
//! [`EventLoop`] owns the [`Registry`], the chosen [`Poller`] and the
//! [`Observer`]. Each [`EventLoop::turn`] is one iteration:
//!
//! 1. Hand the registry snapshot to the poller and block for at most the
//!    configured timeout
//! 2. Route every ready handle, in the order the poller produced them: the
//!    listener to the accept handler, connections to the receive handler
//! 3. Return, leaving all registry changes visible to the next wait
//!
//! Nothing but setup can stop the loop. Timeouts, failed waits, failed accepts
//! and broken connections are reported and the next turn starts as usual.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::net::Listener;
use crate::reactor::handlers::{self, Accepted, Received};
use crate::reactor::observer::Observer;
use crate::reactor::poller::Poller;
use crate::reactor::registry::{Handle, Registry, Role};

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

/// Outcome of one [`EventLoop::turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The wait timed out with nothing ready.
    Idle,
    /// This many ready handles were dispatched.
    Dispatched(usize),
    /// The wait failed; nothing was dispatched.
    Failed,
}

/// Running counters, updated on every turn.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub ticks: u64,
    pub timeouts: u64,
    pub query_failures: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub accept_failures: u64,
    pub chunks: u64,
    pub bytes: u64,
    pub closed: u64,
}

pub struct EventLoop<P: Poller, O: Observer> {
    config: Config,
    registry: Registry,
    poller: P,
    observer: O,
    ready: Vec<Handle>,
    buffer: Vec<u8>,
    stats: Stats,
}

impl<P: Poller, O: Observer> EventLoop<P, O> {
    /// Binds the listener, opens the poller and registers the listener with it.
    ///
    /// # Errors
    /// [`Error::SetupFailed`] for any failure; the loop never starts half built.
    pub fn new(config: Config, observer: O) -> Result<Self> {
        let listener = Listener::bind(&config)?;
        let mut poller = P::open(&config)?;

        poller
            .register(listener.as_raw_fd(), Role::Listener)
            .map_err(|err| match err {
                Error::SetupFailed { .. } => err,
                other => Error::setup("register listener", io::Error::other(other)),
            })?;

        let registry = Registry::new(listener, config.max_connections);
        let buffer = vec![0; config.chunk_size.max(1)];

        tracing::debug!(
            strategy = %P::STRATEGY,
            timeout_ms = config.timeout.as_millis() as u64,
            max_connections = ?config.max_connections,
            "event loop ready"
        );

        Ok(Self {
            config,
            registry,
            poller,
            observer,
            ready: Vec::new(),
            buffer,
            stats: Stats::default(),
        })
    }

    /// Turns forever. The process is expected to be terminated externally.
    pub fn run(&mut self) -> ! {
        match self.local_addr() {
            Ok(address) => tracing::info!(strategy = %P::STRATEGY, %address, "listening"),
            Err(error) => tracing::info!(strategy = %P::STRATEGY, %error, "listening"),
        }

        loop {
            self.turn();
        }
    }

    pub fn turn(&mut self) -> Tick {
        self.stats.ticks += 1;
        self.ready.clear();

        let snapshot = self.registry.snapshot();
        match self
            .poller
            .wait(&snapshot, self.config.timeout, &mut self.ready)
        {
            Err(error) => {
                self.stats.query_failures += 1;
                self.observer.on_error(&error);
                return Tick::Failed;
            }
            Ok(0) => {
                self.stats.timeouts += 1;
                self.observer.on_timeout(P::STRATEGY);
                return Tick::Idle;
            }
            Ok(_) => {}
        }

        let ready = mem::take(&mut self.ready);
        for &handle in &ready {
            self.dispatch(handle);
        }

        let dispatched = ready.len();
        self.ready = ready;

        Tick::Dispatched(dispatched)
    }

    fn dispatch(&mut self, handle: Handle) {
        match handle.role {
            Role::Listener => self.on_listener_ready(),
            Role::Connection => self.on_connection_ready(handle.fd),
        }
    }

    fn on_listener_ready(&mut self) {
        match handlers::accept(&mut self.registry, &mut self.poller) {
            Ok(Accepted::Registered { fd, peer }) => {
                self.stats.accepted += 1;
                self.observer.on_accept(fd, peer);
            }
            Ok(Accepted::Rejected { peer, error }) => {
                self.stats.rejected += 1;
                self.observer.on_reject(peer, &error);
            }
            Err(error) => {
                self.stats.accept_failures += 1;
                self.observer.on_error(&error);
            }
        }
    }

    fn on_connection_ready(&mut self, fd: RawFd) {
        match handlers::receive(&mut self.registry, &mut self.poller, fd, &mut self.buffer) {
            Ok(Received::Chunk(n)) => {
                self.stats.chunks += 1;
                self.stats.bytes += n as u64;
                self.observer.on_receive(fd, &self.buffer[..n]);
            }
            Ok(Received::Spurious) => {
                tracing::trace!(fd, "spurious readiness");
            }
            Ok(Received::Closed(error)) => {
                self.stats.closed += 1;
                self.observer.on_close(fd, error.as_ref());
            }
            Err(error) => self.observer.on_error(&error),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.registry.listener().local_addr()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }
}
