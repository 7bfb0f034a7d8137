//! Readiness-driven connection multiplexer.
//!
//! This module holds the single-threaded core:
//! - [`registry`]: the handles being watched
//! - [`poller`]: the three readiness strategies behind the [`Poller`] trait
//! - [`event_loop`]: the loop that waits and dispatches
//! - [`observer`]: where accepts, chunks and closes are reported
//! - `handlers`: accept and receive

pub mod event_loop;
mod handlers;
pub mod observer;
pub mod poller;
pub mod registry;

pub use event_loop::{EventLoop, Stats, Tick};
pub use observer::{LogObserver, Observer};
pub use poller::{EventQueuePoller, PollPoller, Poller, SelectPoller};
pub use registry::{Handle, Registry, Role, Snapshot};
