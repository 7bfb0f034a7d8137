//! Diagnostic sink for everything the loop does.

use crate::config::Strategy;
use crate::error::Error;

use std::net::SocketAddr;
use std::os::unix::io::RawFd;

/// Receives one callback per externally visible loop event.
///
/// Only [`Observer::on_receive`] is required; the rest default to doing nothing.
pub trait Observer {
    fn on_accept(&mut self, _fd: RawFd, _peer: Option<SocketAddr>) {}

    /// A connection was accepted but closed without being registered.
    fn on_reject(&mut self, _peer: Option<SocketAddr>, _error: &Error) {}

    fn on_receive(&mut self, fd: RawFd, chunk: &[u8]);

    /// The connection was unregistered and closed. `error` is `None` on end of
    /// stream.
    fn on_close(&mut self, _fd: RawFd, _error: Option<&Error>) {}

    fn on_timeout(&mut self, _strategy: Strategy) {}

    fn on_error(&mut self, _error: &Error) {}
}

/// Reports through `tracing`, one line per accept and per received chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_accept(&mut self, fd: RawFd, peer: Option<SocketAddr>) {
        match peer {
            Some(peer) => tracing::info!(fd, "connected by {peer}"),
            None => tracing::info!(fd, "connected"),
        }
    }

    fn on_reject(&mut self, peer: Option<SocketAddr>, error: &Error) {
        tracing::warn!(?peer, %error, "connection rejected");
    }

    fn on_receive(&mut self, fd: RawFd, chunk: &[u8]) {
        tracing::info!(fd, "recv: {}", String::from_utf8_lossy(chunk));
    }

    fn on_close(&mut self, fd: RawFd, error: Option<&Error>) {
        match error {
            Some(error) => tracing::warn!(fd, %error, "recv error"),
            None => tracing::info!(fd, "peer closed"),
        }
    }

    fn on_timeout(&mut self, strategy: Strategy) {
        tracing::debug!("{strategy} time out");
    }

    fn on_error(&mut self, error: &Error) {
        tracing::warn!(%error, "loop error");
    }
}
