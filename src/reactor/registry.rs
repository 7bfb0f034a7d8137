//! The set of handles the event loop watches.
//!
//! [`Registry`] owns the listener and every accepted [`Connection`]. Whatever it
//! holds is exactly what the next readiness query sees through [`Registry::snapshot`].
//!
//! Connections live in a `Vec` kept in registration order, with an fd → position
//! map beside it. Insertion is O(1). Removal shifts the tail down and re-indexes
//! it, O(n) in the number of connections; in exchange the scan order of the
//! bounded strategies stays registration order and no slot is ever reused while
//! a snapshot is alive.

use crate::error::{Error, Result};
use crate::net::{Connection, Listener};

use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

/// What a registered handle is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Listener,
    Connection,
}

/// A registered fd tagged with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub fd: RawFd,
    pub role: Role,
}

impl Handle {
    pub fn listener(fd: RawFd) -> Self {
        Self {
            fd,
            role: Role::Listener,
        }
    }

    pub fn connection(fd: RawFd) -> Self {
        Self {
            fd,
            role: Role::Connection,
        }
    }
}

/// Borrowed view of the registry for one readiness query.
///
/// The listener comes first, followed by connections in registration order.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    listener: RawFd,
    connections: &'a [Connection],
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(listener: RawFd, connections: &'a [Connection]) -> Self {
        Self {
            listener,
            connections,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = Handle> + 'a {
        std::iter::once(Handle::listener(self.listener)).chain(
            self.connections
                .iter()
                .map(|connection| Handle::connection(connection.as_raw_fd())),
        )
    }
}

#[derive(Debug)]
pub struct Registry {
    listener: Listener,
    connections: Vec<Connection>,
    index: HashMap<RawFd, usize>,
    capacity: Option<usize>,
}

impl Registry {
    /// Registers `listener` with role [`Role::Listener`]. `capacity` bounds the
    /// number of connections, `None` leaves it unbounded.
    pub fn new(listener: Listener, capacity: Option<usize>) -> Self {
        Self {
            listener,
            connections: Vec::new(),
            index: HashMap::new(),
            capacity,
        }
    }

    /// Adds a connection at the end of the scan order.
    ///
    /// # Errors
    /// - [`Error::RegistryFull`]: the connection is closed, not queued.
    /// - [`Error::DuplicateHandle`]: the fd is already registered. The incoming
    ///   value is released without closing, since the fd number belongs to the
    ///   registered handle.
    pub fn register(&mut self, connection: Connection) -> Result<RawFd> {
        let fd = connection.as_raw_fd();

        if fd == self.listener.as_raw_fd() || self.index.contains_key(&fd) {
            let _ = connection.into_raw_fd();
            return Err(Error::DuplicateHandle(fd));
        }

        if let Some(capacity) = self.capacity
            && self.connections.len() >= capacity
        {
            drop(connection);
            return Err(Error::RegistryFull { capacity });
        }

        self.index.insert(fd, self.connections.len());
        self.connections.push(connection);

        Ok(fd)
    }

    /// Removes a connection and hands it back; dropping it closes the socket.
    ///
    /// The listener is never removed, so its fd is reported as unknown here.
    pub fn unregister(&mut self, fd: RawFd) -> Result<Connection> {
        let position = self.index.remove(&fd).ok_or(Error::UnknownHandle(fd))?;
        let connection = self.connections.remove(position);

        for (offset, shifted) in self.connections[position..].iter().enumerate() {
            self.index.insert(shifted.as_raw_fd(), position + offset);
        }

        Ok(connection)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(self.listener.as_raw_fd(), &self.connections)
    }

    pub fn get(&self, fd: RawFd) -> Option<&Connection> {
        self.index.get(&fd).map(|&position| &self.connections[position])
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.index.contains_key(&fd)
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Number of registered connections, not counting the listener.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.connections.len() >= capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Strategy};

    use std::os::unix::net::UnixStream;

    fn listener() -> Listener {
        let mut config = Config::for_strategy(Strategy::Poll);
        config.host = std::net::Ipv4Addr::LOCALHOST;
        config.port = 0;
        Listener::bind(&config).expect("bind listener")
    }

    // The peer end is leaked so the local end stays open and connected.
    fn connection() -> Connection {
        let (local, peer) = UnixStream::pair().expect("socket pair");
        std::mem::forget(peer);
        Connection::new(local.into_raw_fd(), None)
    }

    fn fds(registry: &Registry) -> Vec<RawFd> {
        registry.snapshot().iter().map(|handle| handle.fd).collect()
    }

    #[test]
    fn snapshot_lists_listener_first_then_registration_order() {
        let mut registry = Registry::new(listener(), None);
        let listener_fd = registry.listener().as_raw_fd();

        let a = registry.register(connection()).unwrap();
        let b = registry.register(connection()).unwrap();
        let c = registry.register(connection()).unwrap();

        assert_eq!(fds(&registry), vec![listener_fd, a, b, c]);
        assert_eq!(registry.snapshot().len(), 4);

        let roles: Vec<Role> = registry.snapshot().iter().map(|h| h.role).collect();
        assert_eq!(
            roles,
            vec![Role::Listener, Role::Connection, Role::Connection, Role::Connection]
        );
    }

    #[test]
    fn removing_from_the_middle_keeps_order_and_index() {
        let mut registry = Registry::new(listener(), None);
        let listener_fd = registry.listener().as_raw_fd();

        let a = registry.register(connection()).unwrap();
        let b = registry.register(connection()).unwrap();
        let c = registry.register(connection()).unwrap();
        let d = registry.register(connection()).unwrap();

        let removed = registry.unregister(b).unwrap();
        assert_eq!(removed.as_raw_fd(), b);
        drop(removed);

        assert_eq!(fds(&registry), vec![listener_fd, a, c, d]);
        assert_eq!(registry.get(c).map(AsRawFd::as_raw_fd), Some(c));
        assert_eq!(registry.get(d).map(AsRawFd::as_raw_fd), Some(d));

        registry.unregister(d).unwrap();
        registry.unregister(a).unwrap();
        assert_eq!(fds(&registry), vec![listener_fd, c]);
    }

    #[test]
    fn unregistering_an_unknown_handle_changes_nothing() {
        let mut registry = Registry::new(listener(), None);
        let a = registry.register(connection()).unwrap();
        let before = fds(&registry);

        let err = registry.unregister(a + 1000).unwrap_err();
        assert!(matches!(err, Error::UnknownHandle(fd) if fd == a + 1000));
        assert_eq!(fds(&registry), before);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn listener_cannot_be_unregistered() {
        let mut registry = Registry::new(listener(), None);
        let listener_fd = registry.listener().as_raw_fd();

        assert!(matches!(
            registry.unregister(listener_fd),
            Err(Error::UnknownHandle(_))
        ));
        assert_eq!(fds(&registry), vec![listener_fd]);
    }

    #[test]
    fn duplicate_fd_is_refused_without_closing_it() {
        let mut registry = Registry::new(listener(), None);
        let a = registry.register(connection()).unwrap();

        let alias = Connection::new(a, None);
        assert!(matches!(registry.register(alias), Err(Error::DuplicateHandle(fd)) if fd == a));

        // The registered fd must still be open.
        let ret = unsafe { libc::fcntl(a, libc::F_GETFD) };
        assert!(ret >= 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn full_registry_rejects_and_closes() {
        let mut registry = Registry::new(listener(), Some(2));
        registry.register(connection()).unwrap();
        registry.register(connection()).unwrap();
        assert!(registry.is_full());

        let extra = connection();
        let extra_fd = extra.as_raw_fd();
        assert!(matches!(
            registry.register(extra),
            Err(Error::RegistryFull { capacity: 2 })
        ));
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(extra_fd));
    }
}
