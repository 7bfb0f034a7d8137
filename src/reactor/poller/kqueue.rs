use crate::config::{Config, DEFAULT_EVENTS_CAPACITY, Strategy};
use crate::error::{Error, Result};
use crate::reactor::poller::Poller;
use crate::reactor::registry::{Handle, Role, Snapshot};

use libc::{
    EEXIST, ENOENT, EV_ADD, EV_DELETE, EV_ENABLE, EVFILT_READ, c_long, close, kevent, kqueue,
    time_t, timespec,
};
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

/// Event-queue strategy on macOS and the BSDs.
pub struct KqueuePoller {
    kqueue: RawFd,
    events: Vec<kevent>,
    listener: Option<RawFd>,
}

fn read_event(fd: RawFd, flags: u16) -> kevent {
    let mut event: kevent = unsafe { mem::zeroed() };
    event.ident = fd as _;
    event.filter = EVFILT_READ as _;
    event.flags = flags as _;
    event
}

impl KqueuePoller {
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_EVENTS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let kqueue = unsafe { kqueue() };
        if kqueue < 0 {
            return Err(Error::setup("kqueue", io::Error::last_os_error()));
        }

        let events = (0..capacity.max(1))
            .map(|_| unsafe { mem::zeroed::<kevent>() })
            .collect();

        Ok(Self {
            kqueue,
            events,
            listener: None,
        })
    }

    fn change(&self, event: &kevent) -> io::Result<()> {
        let ret = unsafe { kevent(self.kqueue, event, 1, ptr::null_mut(), 0, ptr::null()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Poller for KqueuePoller {
    const STRATEGY: Strategy = Strategy::EventQueue;

    fn open(config: &Config) -> Result<Self> {
        Self::with_capacity(config.events_capacity)
    }

    fn register(&mut self, fd: RawFd, role: Role) -> Result<()> {
        // EV_ADD on an existing filter silently modifies it, so duplicates are
        // caught by the registry before this point.
        self.change(&read_event(fd, (EV_ADD | EV_ENABLE) as u16))
            .map_err(|source| match source.raw_os_error() {
                Some(EEXIST) => Error::DuplicateHandle(fd),
                _ => Error::RegisterFailed { fd, source },
            })?;

        if role == Role::Listener {
            self.listener = Some(fd);
        }

        Ok(())
    }

    fn deregister(&mut self, fd: RawFd) -> Result<()> {
        self.change(&read_event(fd, EV_DELETE as u16))
            .map_err(|source| match source.raw_os_error() {
                Some(ENOENT) => Error::UnknownHandle(fd),
                _ => Error::RegisterFailed { fd, source },
            })?;

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
        let ts = timespec {
            tv_sec: timeout.as_secs() as time_t,
            tv_nsec: timeout.subsec_nanos() as c_long,
        };

        let n_events = unsafe {
            kevent(
                self.kqueue,
                ptr::null(),
                0,
                self.events.as_mut_ptr(),
                self.events.len() as i32,
                &ts,
            )
        };

        if n_events < 0 {
            return Err(Error::QueryFailed(io::Error::last_os_error()));
        }

        let before = ready.len();
        for event in self.events.iter().take(n_events as usize) {
            if event.filter != EVFILT_READ as _ {
                continue;
            }

            let fd = event.ident as RawFd;
            let role = if self.listener == Some(fd) {
                Role::Listener
            } else {
                Role::Connection
            };
            ready.push(Handle { fd, role });
        }

        Ok(ready.len() - before)
    }
}

impl Drop for KqueuePoller {
    fn drop(&mut self) {
        unsafe {
            close(self.kqueue);
        }
    }
}
