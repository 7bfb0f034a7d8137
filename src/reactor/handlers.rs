use crate::error::{Error, Result};
use crate::reactor::poller::Poller;
use crate::reactor::registry::{Registry, Role};

use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

pub(crate) enum Accepted {
    Registered {
        fd: RawFd,
        peer: Option<SocketAddr>,
    },
    /// Accepted, then closed without registration.
    Rejected {
        peer: Option<SocketAddr>,
        error: Error,
    },
}

pub(crate) enum Received {
    Chunk(usize),
    /// Readiness was stale; nothing to read yet.
    Spurious,
    /// Unregistered and closed. `None` on end of stream.
    Closed(Option<Error>),
}

/// Accepts one pending connection and registers it with both the registry and
/// the poller. Only one accept per readiness report; anything else still in the
/// backlog keeps the listener readable for the next wait.
pub(crate) fn accept<P: Poller>(registry: &mut Registry, poller: &mut P) -> Result<Accepted> {
    let connection = registry.listener().accept()?;
    let fd = connection.as_raw_fd();
    let peer = connection.peer_addr();

    if let Err(error) = registry.register(connection) {
        return Ok(Accepted::Rejected { peer, error });
    }

    if let Err(error) = poller.register(fd, Role::Connection) {
        drop(registry.unregister(fd)?);
        return Ok(Accepted::Rejected { peer, error });
    }

    Ok(Accepted::Registered { fd, peer })
}

/// Reads at most `buf.len()` bytes from `fd`.
///
/// On end of stream or a read error the connection is removed from the poller
/// and the registry and closed before returning.
pub(crate) fn receive<P: Poller>(
    registry: &mut Registry,
    poller: &mut P,
    fd: RawFd,
    buf: &mut [u8],
) -> Result<Received> {
    let connection = registry.get(fd).ok_or(Error::UnknownHandle(fd))?;

    match connection.recv(buf) {
        Ok(0) => {
            close(registry, poller, fd)?;
            Ok(Received::Closed(None))
        }
        Ok(n) => Ok(Received::Chunk(n)),
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(Received::Spurious)
        }
        Err(source) => {
            close(registry, poller, fd)?;
            Ok(Received::Closed(Some(Error::ReceiveFailed { fd, source })))
        }
    }
}

fn close<P: Poller>(registry: &mut Registry, poller: &mut P, fd: RawFd) -> Result<()> {
    // Deregister while the fd is still open; closing happens when the
    // connection returned by the registry is dropped.
    if let Err(error) = poller.deregister(fd) {
        tracing::warn!(fd, %error, "deregister failed");
    }

    drop(registry.unregister(fd)?);

    Ok(())
}
