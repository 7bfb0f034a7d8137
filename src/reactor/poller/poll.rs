use crate::config::{Config, Strategy};
use crate::error::{Error, Result};
use crate::reactor::poller::{Poller, timeout_millis};
use crate::reactor::registry::{Handle, Role, Snapshot};

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, nfds_t, poll, pollfd};
use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Pollable-array strategy.
///
/// One persistent `pollfd` per registered handle, kept dense in registration
/// order. Removal shifts the tail down by one and re-indexes it; it only runs
/// from a handler, never while the array is being scanned, so no entry is
/// skipped or visited twice.
#[derive(Default)]
pub struct PollPoller {
    fds: Vec<pollfd>,
    roles: Vec<Role>,
    index: HashMap<RawFd, usize>,
}

const READY_MASK: libc::c_short = POLLIN | POLLHUP | POLLERR | POLLNVAL;

impl PollPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }
}

impl Poller for PollPoller {
    const STRATEGY: Strategy = Strategy::Poll;

    fn open(config: &Config) -> Result<Self> {
        let slots = config.max_connections.map_or(0, |bound| bound + 1);
        Ok(Self {
            fds: Vec::with_capacity(slots),
            roles: Vec::with_capacity(slots),
            index: HashMap::with_capacity(slots),
        })
    }

    fn register(&mut self, fd: RawFd, role: Role) -> Result<()> {
        if self.index.contains_key(&fd) {
            return Err(Error::DuplicateHandle(fd));
        }

        self.index.insert(fd, self.fds.len());
        self.fds.push(pollfd {
            fd,
            events: POLLIN,
            revents: 0,
        });
        self.roles.push(role);

        Ok(())
    }

    fn deregister(&mut self, fd: RawFd) -> Result<()> {
        let position = self.index.remove(&fd).ok_or(Error::UnknownHandle(fd))?;

        self.fds.remove(position);
        self.roles.remove(position);

        for (offset, entry) in self.fds[position..].iter().enumerate() {
            self.index.insert(entry.fd, position + offset);
        }

        Ok(())
    }

    fn wait(
        &mut self,
        snapshot: &Snapshot<'_>,
        timeout: Duration,
        ready: &mut Vec<Handle>,
    ) -> Result<usize> {
        debug_assert_eq!(snapshot.len(), self.fds.len());

        let ret = unsafe {
            poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as nfds_t,
                timeout_millis(timeout),
            )
        };

        if ret < 0 {
            return Err(Error::QueryFailed(io::Error::last_os_error()));
        }

        if ret == 0 {
            return Ok(0);
        }

        let before = ready.len();
        for (entry, &role) in self.fds.iter_mut().zip(&self.roles) {
            if entry.revents & READY_MASK != 0 {
                ready.push(Handle { fd: entry.fd, role });
            }
            entry.revents = 0;
        }

        Ok(ready.len() - before)
    }
}
