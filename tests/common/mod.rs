#![allow(dead_code)]

use sockmux::{
    Config, Error, EventLoop, Handle, Observer, Poller, Result, Role, ServerBuilder, Snapshot,
    Strategy,
};

use std::cell::Cell;
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::os::unix::io::RawFd;
use std::thread::LocalKey;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Accepted(RawFd),
    Rejected,
    Received(RawFd, Vec<u8>),
    Closed(RawFd, bool),
    Timeout,
    Failed,
}

/// Observer that remembers everything, keyed by the client's local address.
#[derive(Debug, Default)]
pub struct Recorder {
    pub seen: Vec<Seen>,
    peers: HashMap<RawFd, SocketAddr>,
    pub by_peer: HashMap<SocketAddr, Vec<Vec<u8>>>,
}

impl Recorder {
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.seen
            .iter()
            .filter_map(|seen| match seen {
                Seen::Received(_, chunk) => Some(chunk.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: fn(&Seen) -> bool) -> usize {
        self.seen.iter().filter(|seen| wanted(seen)).count()
    }

    pub fn chunks_from(&self, client: &TcpStream) -> Vec<Vec<u8>> {
        let local = client.local_addr().expect("client address");
        self.by_peer.get(&local).cloned().unwrap_or_default()
    }
}

impl Observer for Recorder {
    fn on_accept(&mut self, fd: RawFd, peer: Option<SocketAddr>) {
        if let Some(peer) = peer {
            self.peers.insert(fd, peer);
            self.by_peer.entry(peer).or_default();
        }
        self.seen.push(Seen::Accepted(fd));
    }

    fn on_reject(&mut self, _peer: Option<SocketAddr>, _error: &Error) {
        self.seen.push(Seen::Rejected);
    }

    fn on_receive(&mut self, fd: RawFd, chunk: &[u8]) {
        if let Some(peer) = self.peers.get(&fd) {
            self.by_peer.entry(*peer).or_default().push(chunk.to_vec());
        }
        self.seen.push(Seen::Received(fd, chunk.to_vec()));
    }

    fn on_close(&mut self, fd: RawFd, error: Option<&Error>) {
        self.peers.remove(&fd);
        self.seen.push(Seen::Closed(fd, error.is_some()));
    }

    fn on_timeout(&mut self, _strategy: Strategy) {
        self.seen.push(Seen::Timeout);
    }

    fn on_error(&mut self, _error: &Error) {
        self.seen.push(Seen::Failed);
    }
}

pub const TICK: Duration = Duration::from_millis(50);

pub fn builder() -> ServerBuilder {
    ServerBuilder::new()
        .host(Ipv4Addr::LOCALHOST)
        .port(0)
        .timeout(TICK)
}

pub fn server<P: Poller>(builder: ServerBuilder) -> EventLoop<P, Recorder> {
    builder
        .build::<P, _>(Recorder::default())
        .expect("build event loop")
}

pub fn connect<P: Poller, O: Observer>(server: &EventLoop<P, O>) -> TcpStream {
    let address = server.local_addr().expect("local addr");
    let stream = TcpStream::connect(address).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("read timeout");
    stream
}

/// Turns the loop until `done` holds, failing the test after a bounded number
/// of turns.
pub fn drive_until<P, F>(server: &mut EventLoop<P, Recorder>, mut done: F)
where
    P: Poller,
    F: FnMut(&EventLoop<P, Recorder>) -> bool,
{
    for _ in 0..100 {
        if done(server) {
            return;
        }
        server.turn();
    }
    assert!(done(server), "condition not reached; saw {:?}", server.observer().seen);
}

pub fn accept_all<P: Poller>(server: &mut EventLoop<P, Recorder>, expected: u64) {
    drive_until(server, |s| {
        let stats = s.stats();
        stats.accepted + stats.rejected >= expected
    });
}

thread_local! {
    static FAILING_WAITS: Cell<usize> = const { Cell::new(0) };
    static STALE_LISTENER_WAKES: Cell<usize> = const { Cell::new(0) };
}

fn take_one(counter: &'static LocalKey<Cell<usize>>) -> bool {
    counter.with(|left| {
        let n = left.get();
        if n > 0 {
            left.set(n - 1);
        }
        n > 0
    })
}

/// Makes the next `n` waits of any [`Faulty`] poller on this thread fail.
pub fn fail_next_waits(n: usize) {
    FAILING_WAITS.with(|left| left.set(n));
}

/// Makes the next `n` waits report the listener ready without consulting the
/// kernel, whether or not a connection is pending.
pub fn wake_listener_falsely(n: usize) {
    STALE_LISTENER_WAKES.with(|left| left.set(n));
}

/// Wraps a real poller and injects failures on demand. Each test runs on its
/// own thread, so the knobs are thread-local.
pub struct Faulty<P>(P);

impl<P: Poller> Poller for Faulty<P> {
    const STRATEGY: Strategy = P::STRATEGY;

    fn open(config: &Config) -> Result<Self> {
        P::open(config).map(Faulty)
    }

    fn register(&mut self, fd: RawFd, role: Role) -> Result<()> {
        self.0.register(fd, role)
    }

    fn deregister(&mut self, fd: RawFd) -> Result<()> {
        self.0.deregister(fd)
    }

    fn wait(
        &mut self,
        snapshot: &Snapshot<'_>,
        timeout: Duration,
        ready: &mut Vec<Handle>,
    ) -> Result<usize> {
        if take_one(&FAILING_WAITS) {
            return Err(Error::QueryFailed(io::Error::from_raw_os_error(libc::EINTR)));
        }

        if take_one(&STALE_LISTENER_WAKES)
            && let Some(listener) = snapshot.iter().find(|h| h.role == Role::Listener)
        {
            ready.push(listener);
            return Ok(1);
        }

        self.0.wait(snapshot, timeout, ready)
    }
}
