//! Fluent builder for event loop construction.
//!
//! Collects configuration overrides and resolves everything left unset against
//! the defaults of the strategy picked at `build` time.

use crate::config::{Config, Strategy};
use crate::error::Result;
use crate::reactor::{EventLoop, Observer, Poller};

use std::net::Ipv4Addr;
use std::time::Duration;

/// Builder for [`EventLoop`] instances.
///
/// # Example
/// ```ignore
/// let mut server = ServerBuilder::new()
///     .port(3333)
///     .timeout(Duration::from_secs(5))
///     .build::<PollPoller, _>(LogObserver)?;
/// server.run();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    host: Option<Ipv4Addr>,
    port: Option<u16>,
    backlog: Option<i32>,
    timeout: Option<Duration>,
    max_connections: Option<Option<usize>>,
    chunk_size: Option<usize>,
    events_capacity: Option<usize>,
    nonblocking: Option<bool>,
}

impl ServerBuilder {
    /// Creates a builder with every field at its strategy default.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: Ipv4Addr) -> Self {
        self.host = Some(host);
        self
    }

    /// Port to listen on; `0` lets the OS pick one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = Some(backlog);
        self
    }

    /// How long one readiness wait may block before the loop ticks idle.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Caps the number of simultaneously registered connections.
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = Some(Some(max_connections));
        self
    }

    /// Removes the connection cap, even for the bounded strategies.
    pub fn unbounded(mut self) -> Self {
        self.max_connections = Some(None);
        self
    }

    /// Largest payload read per receive.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Ready events collected by one event-queue wait.
    pub fn events_capacity(mut self, events_capacity: usize) -> Self {
        self.events_capacity = Some(events_capacity);
        self
    }

    /// Whether the listener and accepted sockets use `O_NONBLOCK`.
    pub fn nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = Some(nonblocking);
        self
    }

    /// Resolves the overrides against `strategy`'s defaults.
    pub fn config(&self, strategy: Strategy) -> Config {
        let defaults = Config::for_strategy(strategy);

        Config {
            strategy,
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            backlog: self.backlog.unwrap_or(defaults.backlog),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            events_capacity: self.events_capacity.unwrap_or(defaults.events_capacity),
            nonblocking: self.nonblocking.unwrap_or(defaults.nonblocking),
        }
    }

    /// Binds the listener and builds an event loop using poller `P`.
    ///
    /// # Errors
    /// [`Error::SetupFailed`](crate::Error::SetupFailed) if the socket or the
    /// poller cannot be set up.
    pub fn build<P: Poller, O: Observer>(self, observer: O) -> Result<EventLoop<P, O>> {
        EventLoop::new(self.config(P::STRATEGY), observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_follow_the_strategy() {
        let builder = ServerBuilder::new().port(0);

        let select = builder.config(Strategy::Select);
        assert_eq!(select.port, 0);
        assert_eq!(select.timeout, Duration::from_secs(5));
        assert_eq!(select.max_connections, Some(128));

        let queue = builder.config(Strategy::EventQueue);
        assert_eq!(queue.timeout, Duration::from_secs(10));
        assert_eq!(queue.max_connections, None);
    }

    #[test]
    fn overrides_win_over_defaults() {
        let config = ServerBuilder::new()
            .max_connections(2)
            .chunk_size(16)
            .nonblocking(false)
            .config(Strategy::EventQueue);

        assert_eq!(config.max_connections, Some(2));
        assert_eq!(config.chunk_size, 16);
        assert!(!config.nonblocking);

        let config = ServerBuilder::new().unbounded().config(Strategy::Poll);
        assert_eq!(config.max_connections, None);
    }
}
