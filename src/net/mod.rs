//! TCP socket primitives.
//!
//! Thin owners of raw file descriptors:
//! - [`listener`]: [`Listener`], the bound listening socket
//! - [`connection`]: [`Connection`], an accepted peer
//! - `utils`: address conversion and `O_NONBLOCK` helpers
//!
//! Both types close their descriptor on drop, so whoever owns the value owns the
//! socket.
//!
//! [`Listener`]: listener::Listener
//! [`Connection`]: connection::Connection

pub mod connection;
pub mod listener;
pub(crate) mod utils;

pub use connection::Connection;
pub use listener::Listener;
