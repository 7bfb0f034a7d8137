use crate::config::{Config, Strategy};
use crate::error::{Error, Result};
use crate::reactor::poller::Poller;
use crate::reactor::registry::{Handle, Role, Snapshot};

use libc::{FD_ISSET, FD_SET, FD_SETSIZE, FD_ZERO, fd_set, select, suseconds_t, time_t, timeval};
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

/// Descriptor-set strategy.
///
/// Keeps no state between calls: every wait rebuilds an `fd_set` from the
/// snapshot and scans it again afterwards. The bitmap is `FD_SETSIZE` bits wide,
/// which caps the fd *value*, not only the number of handles.
#[derive(Debug, Default)]
pub struct SelectPoller {}

impl SelectPoller {
    pub fn new() -> Self {
        Self {}
    }

    fn limit() -> usize {
        FD_SETSIZE as usize
    }
}

impl Poller for SelectPoller {
    const STRATEGY: Strategy = Strategy::Select;

    fn open(_config: &Config) -> Result<Self> {
        Ok(Self::new())
    }

    fn register(&mut self, fd: RawFd, _role: Role) -> Result<()> {
        if fd < 0 || fd as usize >= Self::limit() {
            return Err(Error::HandleOutOfRange {
                fd,
                limit: Self::limit(),
            });
        }

        Ok(())
    }

    fn deregister(&mut self, _fd: RawFd) -> Result<()> {
        Ok(())
    }

    fn wait(
        &mut self,
        snapshot: &Snapshot<'_>,
        timeout: Duration,
        ready: &mut Vec<Handle>,
    ) -> Result<usize> {
        let mut read_set: fd_set = unsafe { mem::zeroed() };
        unsafe { FD_ZERO(&mut read_set) };

        let mut max_fd = -1;
        for handle in snapshot.iter() {
            unsafe { FD_SET(handle.fd, &mut read_set) };
            max_fd = max_fd.max(handle.fd);
        }

        // select may rewrite the timeval, so it is rebuilt on every call.
        let mut tv = timeval {
            tv_sec: timeout.as_secs() as time_t,
            tv_usec: timeout.subsec_micros() as suseconds_t,
        };

        let ret = unsafe {
            select(
                max_fd + 1,
                &mut read_set,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut tv,
            )
        };

        if ret < 0 {
            return Err(Error::QueryFailed(io::Error::last_os_error()));
        }

        if ret == 0 {
            return Ok(0);
        }

        let before = ready.len();
        ready.extend(
            snapshot
                .iter()
                .filter(|handle| unsafe { FD_ISSET(handle.fd, &read_set) }),
        );

        Ok(ready.len() - before)
    }
}
