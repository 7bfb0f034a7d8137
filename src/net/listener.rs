//! The listening socket.
//!
//! Provides a [`Listener`] bound through raw `libc` calls so the accept backlog and
//! the blocking mode stay under the caller's control.
//!
//! # Usage
//!
//! ```ignore
//! use sockmux::net::Listener;
//! use sockmux::{Config, Strategy};
//!
//! let mut config = Config::for_strategy(Strategy::Poll);
//! config.port = 0;
//! let listener = Listener::bind(&config)?;
//! println!("Listening on {}", listener.local_addr()?);
//! ```
use crate::config::Config;
use crate::error::{Error, Result};
use crate::net::connection::Connection;
use crate::net::utils::{set_nonblocking, socketaddr_to_sockaddr, sockaddr_to_socketaddr, storage_to_socketaddr};

use libc::{
    AF_INET, IPPROTO_TCP, SO_REUSEADDR, SOCK_STREAM, SOL_SOCKET, accept, bind, c_int, close,
    getsockname, listen, setsockopt, sockaddr, sockaddr_in, sockaddr_storage, socket, socklen_t,
};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

/// A bound, listening TCP socket.
///
/// Exactly one exists per server. It is created at startup, handed to the
/// registry, and closed when dropped.
#[derive(Debug)]
pub struct Listener {
    file_descriptor: RawFd,
    nonblocking: bool,
}

impl Listener {
    /// Creates, binds and starts listening on `config.address()`.
    ///
    /// This method performs the following:
    /// 1. Creates a new IPv4 stream socket
    /// 2. Enables `SO_REUSEADDR`
    /// 3. Switches it to non-blocking mode when `config.nonblocking` is set
    /// 4. Binds to the configured host and port
    /// 5. Starts listening with `config.backlog`
    ///
    /// # Errors
    /// [`Error::SetupFailed`] naming the step that failed.
    pub fn bind(config: &Config) -> Result<Self> {
        let file_descriptor = unsafe { socket(AF_INET, SOCK_STREAM, IPPROTO_TCP) };
        if file_descriptor < 0 {
            return Err(Error::setup("socket", io::Error::last_os_error()));
        }

        // From here on, dropping `listener` closes the socket on every error path.
        let listener = Self {
            file_descriptor,
            nonblocking: config.nonblocking,
        };

        let enable: c_int = 1;
        let ret = unsafe {
            setsockopt(
                file_descriptor,
                SOL_SOCKET,
                SO_REUSEADDR,
                &enable as *const c_int as *const _,
                mem::size_of::<c_int>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::setup("setsockopt", io::Error::last_os_error()));
        }

        if config.nonblocking {
            set_nonblocking(file_descriptor).map_err(|e| Error::setup("fcntl", e))?;
        }

        let address = socketaddr_to_sockaddr(config.address());
        let ret = unsafe {
            bind(
                file_descriptor,
                &address as *const sockaddr_in as *const sockaddr,
                mem::size_of::<sockaddr_in>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::setup("bind", io::Error::last_os_error()));
        }

        let ret = unsafe { listen(file_descriptor, config.backlog) };
        if ret < 0 {
            return Err(Error::setup("listen", io::Error::last_os_error()));
        }

        Ok(listener)
    }

    /// Completes one pending connection.
    ///
    /// The new connection inherits the listener's blocking mode.
    ///
    /// # Errors
    /// [`Error::AcceptFailed`], including `WouldBlock` when the readiness report was
    /// stale.
    pub fn accept(&self) -> Result<Connection> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

        let file_descriptor = unsafe {
            accept(
                self.file_descriptor,
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        };
        if file_descriptor < 0 {
            return Err(Error::AcceptFailed(io::Error::last_os_error()));
        }

        let connection = Connection::new(file_descriptor, storage_to_socketaddr(&storage));

        if self.nonblocking {
            set_nonblocking(file_descriptor).map_err(Error::AcceptFailed)?;
        }

        Ok(connection)
    }

    /// Returns the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut address: sockaddr_in = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_in>() as socklen_t;
        let result = unsafe {
            getsockname(
                self.file_descriptor,
                &mut address as *mut sockaddr_in as *mut sockaddr,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(sockaddr_to_socketaddr(&address))
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        unsafe {
            close(self.file_descriptor);
        }
    }
}
