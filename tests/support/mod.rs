//! A scripted RFB server, for integration tests that need a real socket
//! pair rather than the in-module `MockStream` the handshake unit tests
//! use. Only security type 1 (None) is implemented here; VNC auth is
//! already covered at the unit level in `src/handshake.rs`.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

pub fn start_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let addr = listener.local_addr().expect("local_addr");
    (listener, addr)
}

/// A 32bpp BGRX `PIXEL_FORMAT` record; its exact contents don't matter to
/// the client under test (it always frames rectangles using its own
/// configured format), only that it is a well-formed 16 bytes.
pub fn pixel_format_bytes() -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0] = 32; // bits_per_pixel
    buf[1] = 32; // depth
    buf[2] = 0; // big_endian_flag
    buf[3] = 1; // true_color_flag
    buf[4..6].copy_from_slice(&65280u16.to_be_bytes());
    buf[6..8].copy_from_slice(&65280u16.to_be_bytes());
    buf[8..10].copy_from_slice(&65280u16.to_be_bytes());
    buf[10] = 0;
    buf[11] = 8;
    buf[12] = 16;
    buf
}

pub fn server_init_bytes(width: u16, height: u16, name: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&width.to_be_bytes());
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(&pixel_format_bytes());
    buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf
}

/// Plays the server side of a no-auth RFB 3.8 handshake over an
/// already-accepted connection, leaving it positioned right after the
/// client's `SetPixelFormat` write.
pub fn server_handshake(stream: &mut TcpStream, width: u16, height: u16, name: &str) {
    stream.write_all(b"RFB 003.008\n").unwrap();
    let mut echoed_version = [0u8; 12];
    stream.read_exact(&mut echoed_version).unwrap();

    stream.write_all(&[1, 1]).unwrap(); // 1 security type: None
    let mut chosen = [0u8; 1];
    stream.read_exact(&mut chosen).unwrap();
    assert_eq!(chosen[0], 1, "client should pick security type None");

    let mut client_init = [0u8; 1];
    stream.read_exact(&mut client_init).unwrap();

    stream
        .write_all(&server_init_bytes(width, height, name))
        .unwrap();

    // SetEncodings (type+pad+count+2 i32 encodings = 12 bytes) followed by
    // SetPixelFormat (type+pad+16-byte format = 20 bytes).
    let mut tail = [0u8; 32];
    stream.read_exact(&mut tail).unwrap();
}

/// Reads a `FramebufferUpdateRequest` (10 bytes: type, incremental, x, y,
/// w, h) and returns whether the client asked for an incremental update.
pub fn read_update_request(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 10];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(buf[0], 3, "expected FramebufferUpdateRequest");
    buf[1] != 0
}

/// A single `PointerEvent` as seen on the wire: message type, button
/// mask, x, y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEventWire {
    pub message_type: u8,
    pub mask: u8,
    pub x: u16,
    pub y: u16,
}

pub fn read_pointer_event(stream: &mut TcpStream) -> PointerEventWire {
    let mut buf = [0u8; 6];
    stream.read_exact(&mut buf).unwrap();
    PointerEventWire {
        message_type: buf[0],
        mask: buf[1],
        x: u16::from_be_bytes([buf[2], buf[3]]),
        y: u16::from_be_bytes([buf[4], buf[5]]),
    }
}

/// Sends a `FramebufferUpdate` with a single rectangle using the given
/// encoding (`0` = Raw with `pixels`, `-223` = DesktopSize with an empty
/// payload).
pub fn send_framebuffer_update(
    stream: &mut TcpStream,
    x: u16,
    y: u16,
    w: u16,
    h: u16,
    encoding: i32,
    pixels: &[u8],
) {
    let mut buf = Vec::new();
    buf.push(0); // message type: FramebufferUpdate
    buf.push(0); // padding
    buf.extend_from_slice(&1u16.to_be_bytes()); // one rectangle
    buf.extend_from_slice(&x.to_be_bytes());
    buf.extend_from_slice(&y.to_be_bytes());
    buf.extend_from_slice(&w.to_be_bytes());
    buf.extend_from_slice(&h.to_be_bytes());
    buf.extend_from_slice(&encoding.to_be_bytes());
    buf.extend_from_slice(pixels);
    stream.write_all(&buf).unwrap();
}

/// Spawns a thread that accepts exactly one connection, completes the
/// handshake, then hands the live stream to `after` for scenario-specific
/// scripting.
pub fn spawn_server<F>(
    width: u16,
    height: u16,
    name: &str,
    after: F,
) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let (listener, addr) = start_listener();
    let name = name.to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        server_handshake(&mut stream, width, height, &name);
        after(stream);
    });
    (addr, handle)
}
