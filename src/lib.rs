//! Single-threaded, readiness-driven TCP connection multiplexer.
//!
//! One listening socket, many connections, one thread. The loop asks the kernel
//! which handles are readable, accepts on the listener, reads one chunk from
//! each ready connection, and drops connections that closed or failed.
//!
//! # Architecture
//!
//! - **Registry**: owns the listener and every accepted connection
//! - **Poller**: the readiness query, in three interchangeable strategies
//!   (`select`, `poll`, `epoll`/`kqueue`)
//! - **EventLoop**: waits on the poller and dispatches accept/receive work
//! - **Observer**: where accepts, received chunks and closes are reported
//! - **ServerBuilder**: fluent construction with per-strategy defaults
//!
//! The strategy is a type parameter, so it is fixed when the loop is built:
//!
//! ```ignore
//! use sockmux::{LogObserver, PollPoller, ServerBuilder};
//!
//! let mut server = ServerBuilder::new().port(3333).build::<PollPoller, _>(LogObserver)?;
//! server.run();
//! ```

mod builder;
pub mod config;
pub mod error;
pub mod net;
pub mod reactor;

pub use builder::ServerBuilder;
pub use config::{Config, Strategy};
pub use error::{Error, Result};
pub use reactor::{
    EventLoop, EventQueuePoller, Handle, LogObserver, Observer, PollPoller, Poller, Registry,
    Role, SelectPoller, Snapshot, Stats, Tick,
};
