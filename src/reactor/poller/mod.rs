//! Readiness-query strategies.
//!
//! Every strategy implements [`Poller`]. The event loop keeps the poller's
//! interest set in lockstep with the [`Registry`](super::Registry): each
//! `register`/`deregister` on one is mirrored on the other before the next
//! [`Poller::wait`].
//!
//! | strategy | per-registration cost | per-wait cost | limit |
//! |---|---|---|---|
//! | [`SelectPoller`] | none | O(n) build + O(n) scan | fd value < `FD_SETSIZE` |
//! | [`PollPoller`] | O(1) insert, O(n) compaction | O(n) scan | none |
//! | [`EventQueuePoller`] | one syscall | O(ready) | none |

mod poll;
mod select;

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
mod kqueue;

pub use poll::PollPoller;
pub use select::SelectPoller;

#[cfg(target_os = "linux")]
pub use epoll::EpollPoller as EventQueuePoller;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub use kqueue::KqueuePoller as EventQueuePoller;

use crate::config::{Config, Strategy};
use crate::error::Result;
use crate::reactor::registry::{Handle, Role, Snapshot};

use std::os::unix::io::RawFd;
use std::time::Duration;

pub trait Poller {
    const STRATEGY: Strategy;

    /// Creates the poller for `config`.
    ///
    /// # Errors
    /// [`Error::SetupFailed`](crate::Error::SetupFailed) when the kernel object
    /// backing the strategy cannot be created.
    fn open(config: &Config) -> Result<Self>
    where
        Self: Sized;

    /// Starts watching `fd` for readability.
    fn register(&mut self, fd: RawFd, role: Role) -> Result<()>;

    /// Stops watching `fd`. Must be called before the fd is closed.
    fn deregister(&mut self, fd: RawFd) -> Result<()>;

    /// Blocks for at most `timeout` and appends the readable handles to `ready`.
    ///
    /// Returns the number of handles appended; `0` means the wait timed out.
    /// `snapshot` is the registry's current view and must match the handles
    /// registered with this poller.
    ///
    /// # Errors
    /// [`Error::QueryFailed`](crate::Error::QueryFailed) when the wait itself
    /// fails. Nothing is appended in that case.
    fn wait(
        &mut self,
        snapshot: &Snapshot<'_>,
        timeout: Duration,
        ready: &mut Vec<Handle>,
    ) -> Result<usize>;
}

/// Whole milliseconds for `poll`/`epoll_wait`, rounded up so a sub-millisecond
/// timeout still blocks instead of returning at once.
pub(crate) fn timeout_millis(timeout: Duration) -> libc::c_int {
    timeout
        .as_micros()
        .div_ceil(1000)
        .min(libc::c_int::MAX as u128) as libc::c_int
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_millis_rounds_up() {
        assert_eq!(timeout_millis(Duration::ZERO), 0);
        assert_eq!(timeout_millis(Duration::from_micros(1)), 1);
        assert_eq!(timeout_millis(Duration::from_micros(900)), 1);
        assert_eq!(timeout_millis(Duration::from_millis(50)), 50);
        assert_eq!(timeout_millis(Duration::from_micros(50_001)), 51);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), libc::c_int::MAX);
    }
}
