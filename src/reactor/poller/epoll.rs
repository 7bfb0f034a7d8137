use crate::config::{Config, DEFAULT_EVENTS_CAPACITY, Strategy};
use crate::error::{Error, Result};
use crate::reactor::poller::{Poller, timeout_millis};
use crate::reactor::registry::{Handle, Role, Snapshot};

use libc::{
    EEXIST, ENOENT, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLIN, close, epoll_create1,
    epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

/// Event-queue strategy on Linux.
///
/// The interest set lives in the kernel; each registration change is one
/// `epoll_ctl` and each wait returns only handles that are ready, at most
/// `capacity` of them. Level-triggered, so anything left unread is reported
/// again on the next wait. Only `EPOLLIN` is requested, so every returned
/// event (readable, hang-up or error) is a ready handle.
pub struct EpollPoller {
    epoll: RawFd,
    events: Vec<epoll_event>,
    listener: Option<RawFd>,
}

impl EpollPoller {
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_EVENTS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(Error::setup("epoll_create1", io::Error::last_os_error()));
        }

        Ok(Self {
            epoll,
            events: vec![epoll_event { events: 0, u64: 0 }; capacity.max(1)],
            listener: None,
        })
    }

    fn role_of(&self, fd: RawFd) -> Role {
        if self.listener == Some(fd) {
            Role::Listener
        } else {
            Role::Connection
        }
    }
}

impl Poller for EpollPoller {
    const STRATEGY: Strategy = Strategy::EventQueue;

    fn open(config: &Config) -> Result<Self> {
        Self::with_capacity(config.events_capacity)
    }

    fn register(&mut self, fd: RawFd, role: Role) -> Result<()> {
        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: fd as u64,
        };

        let ret = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_ADD, fd, &mut event) };
        if ret < 0 {
            let source = io::Error::last_os_error();
            if source.raw_os_error() == Some(EEXIST) {
                return Err(Error::DuplicateHandle(fd));
            }
            return Err(Error::RegisterFailed { fd, source });
        }

        if role == Role::Listener {
            self.listener = Some(fd);
        }

        Ok(())
    }

    fn deregister(&mut self, fd: RawFd) -> Result<()> {
        let ret = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, ptr::null_mut()) };
        if ret < 0 {
            let source = io::Error::last_os_error();
            if source.raw_os_error() == Some(ENOENT) {
                return Err(Error::UnknownHandle(fd));
            }
            return Err(Error::RegisterFailed { fd, source });
        }

        if self.listener == Some(fd) {
            self.listener = None;
        }

        Ok(())
    }

    fn wait(
        &mut self,
        _snapshot: &Snapshot<'_>,
        timeout: Duration,
        ready: &mut Vec<Handle>,
    ) -> Result<usize> {
        let n_events = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.len() as i32,
                timeout_millis(timeout),
            )
        };

        if n_events < 0 {
            return Err(Error::QueryFailed(io::Error::last_os_error()));
        }

        for index in 0..n_events as usize {
            // epoll_event is packed on x86_64; copy the field out before use.
            let fd = self.events[index].u64 as RawFd;
            ready.push(Handle {
                fd,
                role: self.role_of(fd),
            });
        }

        Ok(n_events as usize)
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe {
            close(self.epoll);
        }
    }
}
