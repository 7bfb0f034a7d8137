use libc::{close, recv};

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

/// An accepted peer connection. Closed on drop.
#[derive(Debug)]
pub struct Connection {
    file_descriptor: RawFd,
    peer: Option<SocketAddr>,
}

impl Connection {
    pub(crate) fn new(file_descriptor: RawFd, peer: Option<SocketAddr>) -> Self {
        Self {
            file_descriptor,
            peer,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// One `recv` call into `buf`. `Ok(0)` means the peer closed its side.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let res = unsafe { recv(self.file_descriptor, buf.as_mut_ptr() as *mut _, buf.len(), 0) };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl IntoRawFd for Connection {
    fn into_raw_fd(self) -> RawFd {
        let file_descriptor = self.file_descriptor;
        mem::forget(self);
        file_descriptor
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        unsafe {
            close(self.file_descriptor);
        }
    }
}
