//! S5 (pointer click anti-coalescing offset) and S6 (reconnect after a
//! dropped socket), driven against a real TCP connection.

mod support;

use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use rfb_autoclient::{Client, SessionConfig, SessionState};

#[test]
fn s5_repeated_click_at_the_same_point_nudges_the_second_press() {
    let (addr, handle) = support::spawn_server(640, 480, "desk", |mut stream| {
        let events: Vec<_> = (0..6).map(|_| support::read_pointer_event(&mut stream)).collect();

        let masks: Vec<u8> = events.iter().map(|e| e.mask).collect();
        assert_eq!(masks, vec![0x00, 0x01, 0x00, 0x00, 0x01, 0x00]);

        // first click's press is untouched...
        assert_eq!(events[1].x, 100);
        // ...the second click's press at the same coordinate is nudged
        // off by one pixel to defeat same-coordinate click coalescing.
        assert_eq!(events[4].x, 99);
        assert_eq!(events[4].y, 200);
    });

    let config = SessionConfig::new(addr.ip().to_string())
        .port(addr.port())
        .recv_timeout(Duration::from_millis(100));
    let mut client = Client::connect(config).expect("handshake should succeed");

    client.left_click(100, 200).unwrap();
    client.left_click(100, 200).unwrap();

    client.stop().unwrap();
    handle.join().unwrap();
}

#[test]
fn s6_reconnects_after_the_server_drops_the_socket() {
    let (listener, addr) = support::start_listener();
    let handle = thread::spawn(move || {
        let (mut first, _) = listener.accept().expect("first accept");
        support::server_handshake(&mut first, 640, 480, "desk");
        drop(first); // simulate the connection dying

        // give the client time to observe `Disconnected` before the
        // reconnect succeeds, so the test can't race past that state.
        thread::sleep(Duration::from_millis(150));

        let (mut second, _) = listener.accept().expect("second accept");
        support::server_handshake(&mut second, 640, 480, "desk");
        let mut buf = [0u8; 1];
        let _ = second.read(&mut buf); // block until the client shuts down
    });

    let config = SessionConfig::new(addr.ip().to_string())
        .port(addr.port())
        .recv_timeout(Duration::from_millis(50))
        .retry_backoff(Duration::from_millis(20));
    let mut client = Client::connect(config).expect("initial handshake should succeed");

    let deadline = Instant::now() + Duration::from_secs(2);
    while client.state() != SessionState::Disconnected {
        assert!(Instant::now() < deadline, "client never noticed the dropped socket");
        thread::sleep(Duration::from_millis(10));
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    while client.state() != SessionState::Running {
        assert!(Instant::now() < deadline, "client never reconnected");
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(client.size(), (640, 480));

    client.stop().unwrap();
    handle.join().unwrap();
}
