//! Discovery tests against a loopback advertisement responder.

use std::net::{SocketAddr, UdpSocket};
use std::thread::JoinHandle;
use std::time::Duration;

use wing_client::{scan_with, ConsoleConfig, Error};

/// Answer one probe with the given advertisements, then exit.
fn spawn_responder(replies: Vec<&'static str>) -> (SocketAddr, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = socket.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        socket.set_read_timeout(Some(Duration::from_secs(3))).unwrap();
        let mut buf = [0u8; 64];
        if let Ok((n, from)) = socket.recv_from(&mut buf) {
            assert_eq!(&buf[..n], b"WING?");
            for reply in &replies {
                socket.send_to(reply.as_bytes(), from).unwrap();
            }
        }
    });
    (addr, handle)
}

fn config_for(addr: SocketAddr) -> ConsoleConfig {
    ConsoleConfig {
        discovery_addr: addr,
        scan_timeout: Duration::from_millis(300),
        scan_attempts: 2,
        ..ConsoleConfig::default()
    }
}

#[test]
fn full_scan_collects_every_console_once() {
    let (addr, handle) = spawn_responder(vec![
        "WING,192.168.1.10,FOH,WING,AAA111,3.0.4",
        "WING,192.168.1.11,MON,WING-RACK,BBB222,3.0.4",
        // Consoles answer every probe; duplicates collapse by serial.
        "WING,192.168.1.10,FOH,WING,AAA111,3.0.4",
    ]);

    let found = scan_with(&config_for(addr), false).unwrap();
    handle.join().unwrap();

    assert_eq!(found.count(), 2);
    assert_eq!(found.get(0).unwrap().name, "FOH");
    assert_eq!(found.get(1).unwrap().model, "WING-RACK");
    assert!(matches!(found.get(2), Err(Error::IndexOutOfRange(_))));
}

#[test]
fn stop_on_first_returns_after_one_reply() {
    let (addr, handle) = spawn_responder(vec![
        "WING,192.168.1.10,FOH,WING,AAA111,3.0.4",
        "WING,192.168.1.11,MON,WING-RACK,BBB222,3.0.4",
    ]);

    let found = scan_with(&config_for(addr), true).unwrap();
    handle.join().unwrap();

    assert_eq!(found.count(), 1);
    assert_eq!(found.get(0).unwrap().serial, "AAA111");
    found.release();
}

#[test]
fn silent_network_yields_an_empty_set() {
    // Bound but never answers.
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let config = ConsoleConfig {
        discovery_addr: socket.local_addr().unwrap(),
        scan_timeout: Duration::from_millis(100),
        scan_attempts: 1,
        ..ConsoleConfig::default()
    };

    let found = scan_with(&config, false).unwrap();
    assert!(found.is_empty());
}

#[test]
fn foreign_replies_are_ignored() {
    let (addr, handle) = spawn_responder(vec![
        "M32,192.168.1.9,OLD,M32,ZZZ,4.0",
        "WING,192.168.1.10,FOH,WING,AAA111,3.0.4",
    ]);

    let found = scan_with(&config_for(addr), false).unwrap();
    handle.join().unwrap();

    assert_eq!(found.count(), 1);
    assert_eq!(found.get(0).unwrap().serial, "AAA111");
}
