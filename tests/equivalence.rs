mod common;

use common::{Recorder, accept_all, builder, connect, drive_until, server};
use sockmux::{EventLoop, EventQueuePoller, PollPoller, Poller, SelectPoller};

use std::io::Write;
use std::mem;
use std::os::unix::io::AsRawFd;

const SCRIPT: &[&[&str]] = &[
    &["alpha", "beta"],
    &["gamma"],
    &["delta", "epsilon", "zeta"],
    &[],
    &["eta"],
];

/// Connects one client per script line, sends each message once the previous one
/// was reported, then closes every client. Returns the chunks seen per client.
fn replay<P: Poller>() -> Vec<Vec<Vec<u8>>> {
    let mut server: EventLoop<P, Recorder> = server::<P>(builder());
    let mut clients: Vec<_> = SCRIPT.iter().map(|_| connect(&server)).collect();
    accept_all(&mut server, SCRIPT.len() as u64);

    let mut sent = 0;
    let longest = SCRIPT.iter().map(|line| line.len()).max().unwrap_or(0);
    for round in 0..longest {
        for (client, line) in clients.iter_mut().zip(SCRIPT) {
            if let Some(message) = line.get(round) {
                client.write_all(message.as_bytes()).expect("write");
                sent += 1;
                drive_until(&mut server, |s| s.stats().chunks >= sent);
            }
        }
    }

    let per_client = clients
        .iter()
        .map(|client| server.observer().chunks_from(client))
        .collect();

    let count = clients.len() as u64;
    drop(clients);
    drive_until(&mut server, |s| s.stats().closed == count);
    assert!(server.registry().is_empty());

    per_client
}

#[test]
fn every_strategy_reports_the_same_payloads() {
    let expected: Vec<Vec<Vec<u8>>> = SCRIPT
        .iter()
        .map(|line| line.iter().map(|m| m.as_bytes().to_vec()).collect())
        .collect();

    assert_eq!(replay::<SelectPoller>(), expected);
    assert_eq!(replay::<PollPoller>(), expected);
    assert_eq!(replay::<EventQueuePoller>(), expected);
}

fn reset(client: std::net::TcpStream) {
    let linger = libc::linger {
        l_onoff: 1,
        l_linger: 0,
    };
    let ret = unsafe {
        libc::setsockopt(
            client.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const libc::linger as *const _,
            mem::size_of::<libc::linger>() as libc::socklen_t,
        )
    };
    assert_eq!(ret, 0, "SO_LINGER");
    drop(client);
}

fn broken_peer_leaves_others_alone<P: Poller>() {
    let mut server = server::<P>(builder());
    let mut doomed = connect(&server);
    let mut survivor = connect(&server);
    accept_all(&mut server, 2);

    doomed.write_all(b"bye").expect("write");
    drive_until(&mut server, |s| s.stats().chunks >= 1);

    reset(doomed);
    drive_until(&mut server, |s| s.stats().closed == 1);
    assert_eq!(server.registry().len(), 1);

    survivor.write_all(b"still here").expect("write");
    drive_until(&mut server, |s| s.stats().chunks >= 2);

    assert_eq!(
        server.observer().chunks_from(&survivor),
        vec![b"still here".to_vec()]
    );
    assert_eq!(server.registry().len(), 1);
    assert_eq!(server.stats().query_failures, 0);
}

#[test]
fn reset_connection_does_not_disturb_select() {
    broken_peer_leaves_others_alone::<SelectPoller>();
}

#[test]
fn reset_connection_does_not_disturb_poll() {
    broken_peer_leaves_others_alone::<PollPoller>();
}

#[test]
fn reset_connection_does_not_disturb_event_queue() {
    broken_peer_leaves_others_alone::<EventQueuePoller>();
}
