//! The duplex I/O core (C7), server message dispatcher (C8), and the
//! public [`Client`] command surface (C9).
//!
//! A [`Client`] owns two handles to the same TCP connection: a writer
//! behind a [`Mutex`], held for exactly one logical message per call, and
//! a background reader thread over a `TcpStream::try_clone()`'d handle
//! that drains `FramebufferUpdate`/`SetColourMapEntries`/`Bell`/
//! `ServerCutText` messages into the shared [`Framebuffer`]. This mirrors
//! `client.rs`'s `Event::pump`/`pump_one` split, with reconnection and a
//! `framebuffer_updated` rendezvous layered on top.

use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};

use crate::config::{PixelFormat, SessionConfig};
use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::handshake;
use crate::keysym::{self, Key};
use crate::wire;

/// Lifecycle of a [`Client`] session.
///
/// `Disconnected -> Handshaking -> Initialized -> Running -> Stopping ->
/// Disconnected`. Command methods check for `Running` and return
/// [`VncError::NotRunning`] otherwise; a session between a
/// `ConnectionLost` and a successful reconnect sits in `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Handshaking,
    Initialized,
    Running,
    Stopping,
}

struct Shared {
    framebuffer: Framebuffer,
    name: String,
    pixel_format: PixelFormat,
    framebuffer_updated: bool,
    state: SessionState,
    button_mask: u8,
    click_parity: bool,
    last_click: Option<(u16, u16)>,
}

struct Inner {
    config: SessionConfig,
    writer: Mutex<TcpStream>,
    reader_stream: Mutex<TcpStream>,
    reconnect: Mutex<()>,
    shared: Mutex<Shared>,
    update_cond: Condvar,
    stop: AtomicBool,
}

/// A running RFB session.
///
/// Dropping a `Client` stops the reader thread and shuts down the socket;
/// call [`Client::stop`] explicitly to observe any error from that
/// teardown.
pub struct Client {
    inner: Arc<Inner>,
    reader: Option<JoinHandle<()>>,
}

impl Client {
    /// Connects to `config.hostname:config.port`, runs the handshake, and
    /// starts the background reader thread.
    pub fn connect(config: SessionConfig) -> Result<Client> {
        let stream = TcpStream::connect((config.hostname.as_str(), config.port))
            .map_err(VncError::Io)?;
        let inner = Arc::new(build_inner(stream, config)?);
        inner.shared.lock().unwrap().state = SessionState::Running;
        let reader_inner = Arc::clone(&inner);
        let reader = thread::spawn(move || reader_loop(reader_inner));
        Ok(Client {
            inner,
            reader: Some(reader),
        })
    }

    /// The server's desktop name, as reported in `ServerInit`.
    pub fn name(&self) -> String {
        self.inner.shared.lock().unwrap().name.clone()
    }

    /// The current framebuffer dimensions, updated by `DesktopSize`
    /// rectangles as the session runs.
    pub fn size(&self) -> (u16, u16) {
        let shared = self.inner.shared.lock().unwrap();
        (shared.framebuffer.width(), shared.framebuffer.height())
    }

    /// The pixel format this client advertised via `SetPixelFormat`.
    pub fn pixel_format(&self) -> PixelFormat {
        self.inner.shared.lock().unwrap().pixel_format
    }

    pub fn state(&self) -> SessionState {
        self.inner.shared.lock().unwrap().state
    }

    /// Presses and releases `key`, holding it down for `hold` (default
    /// 100ms).
    pub fn press_key(&self, key: impl Into<Key>, hold: Option<Duration>) -> Result<()> {
        let key = key.into();
        self.key_down(key.clone())?;
        thread::sleep(hold.unwrap_or(Duration::from_millis(100)));
        self.key_up(key)
    }

    pub fn key_down(&self, key: impl Into<Key>) -> Result<()> {
        self.send_key_event(key.into(), true)
    }

    pub fn key_up(&self, key: impl Into<Key>) -> Result<()> {
        self.send_key_event(key.into(), false)
    }

    fn send_key_event(&self, key: Key, down: bool) -> Result<()> {
        self.ensure_running()?;
        let keysym = keysym::to_keysym(key);
        trace!("-> KeyEvent down={} keysym={:#x}", down, keysym);
        self.inner.with_writer(|stream| {
            wire::write_u8(stream, 4)?; // message type: KeyEvent
            wire::write_u8(stream, down as u8)?;
            wire::write_all(stream, &[0u8; 2])?;
            wire::write_u32(stream, keysym)
        })
    }

    /// Raw pointer event: sets or clears the listed 1-based button
    /// indices in the session's button mask, then sends a single
    /// `PointerEvent` with the resulting mask at `(x, y)`.
    ///
    /// A `down == true` call at the same coordinate as the previous one
    /// nudges `x` by one pixel (clamped into bounds) to defeat servers
    /// that coalesce same-coordinate clicks.
    pub fn pointer_event(&self, buttons: &[u8], down: bool, x: u16, y: u16) -> Result<()> {
        self.ensure_running()?;
        let (mask, x) = {
            let mut shared = self.inner.shared.lock().unwrap();
            for &button in buttons {
                if !(1..=8).contains(&button) {
                    continue;
                }
                let bit = 1u8 << (button - 1);
                if down {
                    shared.button_mask |= bit;
                } else {
                    shared.button_mask &= !bit;
                }
            }
            let x = if down {
                let width = shared.framebuffer.width();
                let repeated = shared.last_click == Some((x, y));
                shared.click_parity = repeated && !shared.click_parity;
                shared.last_click = Some((x, y));
                if shared.click_parity {
                    offset_for_repeat(x, width)
                } else {
                    x
                }
            } else {
                x
            };
            (shared.button_mask, x)
        };
        trace!("-> PointerEvent mask={:#04x} x={} y={}", mask, x, y);
        self.inner.with_writer(|stream| {
            wire::write_u8(stream, 5)?; // message type: PointerEvent
            wire::write_u8(stream, mask)?;
            wire::write_u16(stream, x)?;
            wire::write_u16(stream, y)
        })
    }

    /// A full click: hover, press, release. Three `PointerEvent`
    /// messages with masks `0x00`, button-bit, `0x00`.
    pub fn left_click(&self, x: u16, y: u16) -> Result<()> {
        self.click(1, x, y)
    }

    pub fn right_click(&self, x: u16, y: u16) -> Result<()> {
        self.click(3, x, y)
    }

    pub fn middle_click(&self, x: u16, y: u16) -> Result<()> {
        self.click(2, x, y)
    }

    fn click(&self, button: u8, x: u16, y: u16) -> Result<()> {
        self.pointer_event(&[], false, x, y)?;
        self.pointer_event(&[button], true, x, y)?;
        self.pointer_event(&[button], false, x, y)
    }

    pub fn scroll_up(&self, x: u16, y: u16) -> Result<()> {
        self.pointer_event(&[4], true, x, y)?;
        self.pointer_event(&[4], false, x, y)
    }

    pub fn scroll_down(&self, x: u16, y: u16) -> Result<()> {
        self.pointer_event(&[5], true, x, y)?;
        self.pointer_event(&[5], false, x, y)
    }

    /// Requests a full, non-incremental `FramebufferUpdate` and blocks
    /// until one has been applied.
    pub fn refresh_framebuffer(&self) -> Result<()> {
        let (width, height) = self.size();
        self.request_update(0, 0, width.max(1), height.max(1), false)
    }

    /// Requests an incremental 1x1 update purely to pick up a server-
    /// initiated `DesktopSize` resize, and blocks until one arrives.
    pub fn refresh_resolution(&self) -> Result<()> {
        self.request_update(0, 0, 1, 1, true)
    }

    fn request_update(&self, x: u16, y: u16, w: u16, h: u16, incremental: bool) -> Result<()> {
        self.ensure_running()?;
        {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.framebuffer_updated = false;
        }
        self.inner.with_writer(|stream| {
            wire::write_u8(stream, 3)?; // message type: FramebufferUpdateRequest
            wire::write_u8(stream, incremental as u8)?;
            wire::write_u16(stream, x)?;
            wire::write_u16(stream, y)?;
            wire::write_u16(stream, w)?;
            wire::write_u16(stream, h)
        })?;

        let guard = self.inner.shared.lock().unwrap();
        let guard = self
            .inner
            .update_cond
            .wait_while(guard, |s| {
                !s.framebuffer_updated && s.state == SessionState::Running
            })
            .map_err(|_| VncError::ConnectionLost)?;
        if guard.framebuffer_updated {
            Ok(())
        } else {
            Err(VncError::ConnectionLost)
        }
    }

    /// Refreshes and returns a flattened row-major copy of the
    /// framebuffer in the client's configured pixel format.
    pub fn screenshot(&self) -> Result<Vec<u8>> {
        self.refresh_framebuffer()?;
        Ok(self.inner.shared.lock().unwrap().framebuffer.flatten())
    }

    pub fn cut_buffer(&self, text: &str) -> Result<()> {
        self.ensure_running()?;
        let bytes: Vec<u8> = text.bytes().collect();
        self.inner.with_writer(|stream| {
            wire::write_u8(stream, 6)?; // message type: ClientCutText
            wire::write_all(stream, &[0u8; 3])?;
            wire::write_u32(stream, bytes.len() as u32)?;
            wire::write_all(stream, &bytes)
        })
    }

    /// Stops the reader thread and shuts down the socket. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.state = SessionState::Stopping;
        }
        self.inner.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        if let Ok(writer) = self.inner.writer.lock() {
            let _ = writer.shutdown(Shutdown::Both);
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        let shared = self.inner.shared.lock().unwrap();
        if shared.state == SessionState::Running {
            Ok(())
        } else {
            Err(VncError::NotRunning)
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Nudges `x` one pixel away from its previous position and clamps into
/// `[0, width - 1]`, so the ±1 anti-coalescing offset can never push a
/// click outside the framebuffer.
fn offset_for_repeat(x: u16, width: u16) -> u16 {
    let max = width.saturating_sub(1);
    let nudged = if x == 0 { 1 } else { x - 1 };
    nudged.min(max)
}

fn build_inner(mut stream: TcpStream, config: SessionConfig) -> Result<Inner> {
    let _ = stream.set_nodelay(true);
    let info = handshake::run(&mut stream, &config)?;
    let bpp = config.pixel_format.bytes_per_pixel();
    let framebuffer = Framebuffer::new(info.width, info.height, bpp);

    let reader_stream = stream.try_clone().map_err(VncError::Io)?;
    reader_stream
        .set_read_timeout(Some(config.recv_timeout))
        .map_err(VncError::Io)?;

    // ServerInit has just been parsed (pixel format, name, framebuffer
    // size all known); `Client::connect` flips this to `Running` once the
    // reader thread is up.
    let shared = Shared {
        framebuffer,
        name: info.name,
        pixel_format: config.pixel_format,
        framebuffer_updated: false,
        state: SessionState::Initialized,
        button_mask: 0,
        click_parity: false,
        last_click: None,
    };

    Ok(Inner {
        config,
        writer: Mutex::new(stream),
        reader_stream: Mutex::new(reader_stream),
        reconnect: Mutex::new(()),
        shared: Mutex::new(shared),
        update_cond: Condvar::new(),
        stop: AtomicBool::new(false),
    })
}

impl Inner {
    /// Runs `f` against the writer socket, retrying once a reconnect
    /// succeeds if `f` reports `ConnectionLost`.
    fn with_writer<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&mut TcpStream) -> Result<()>,
    {
        loop {
            let result = {
                let mut guard = self.writer.lock().unwrap();
                f(&mut guard)
            };
            match result {
                Ok(()) => return Ok(()),
                Err(VncError::ConnectionLost) => self.reconnect()?,
                Err(e) => return Err(e),
            }
        }
    }

    /// Either runs the reconnection sequence itself (if no one else is),
    /// or blocks until whoever is already running it finishes.
    fn reconnect(&self) -> Result<()> {
        match self.reconnect.try_lock() {
            Ok(_guard) => self.do_reconnect(),
            Err(_) => {
                drop(self.reconnect.lock().unwrap());
                Ok(())
            }
        }
    }

    fn do_reconnect(&self) -> Result<()> {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.state = SessionState::Disconnected;
        }
        if let Ok(writer) = self.writer.lock() {
            let _ = writer.shutdown(Shutdown::Both);
        }

        let mut attempts: u32 = 0;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Err(VncError::ConnectionLost);
            }
            match self.try_handshake_once() {
                Ok(()) => {
                    info!(
                        "reconnected to {}:{} after {} attempt(s)",
                        self.config.hostname,
                        self.config.port,
                        attempts + 1
                    );
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if let Some(budget) = self.config.retry_budget {
                        if attempts >= budget {
                            warn!("giving up reconnecting after {} attempts: {}", attempts, e);
                            return Err(VncError::ConnectionLost);
                        }
                    }
                    debug!("reconnect attempt {} failed: {}", attempts, e);
                    thread::sleep(self.config.retry_backoff);
                }
            }
        }
    }

    fn try_handshake_once(&self) -> Result<()> {
        self.shared.lock().unwrap().state = SessionState::Handshaking;

        let mut stream = TcpStream::connect((self.config.hostname.as_str(), self.config.port))
            .map_err(VncError::Io)?;
        let info = handshake::run(&mut stream, &self.config)?;

        let reader_stream = stream.try_clone().map_err(VncError::Io)?;
        reader_stream
            .set_read_timeout(Some(self.config.recv_timeout))
            .map_err(VncError::Io)?;

        let bpp = self.config.pixel_format.bytes_per_pixel();
        {
            let mut shared = self.shared.lock().unwrap();
            shared.framebuffer = Framebuffer::new(info.width, info.height, bpp);
            shared.name = info.name;
            shared.framebuffer_updated = false;
            shared.button_mask = 0;
            shared.last_click = None;
            shared.state = SessionState::Initialized;
        }
        *self.writer.lock().unwrap() = stream;
        *self.reader_stream.lock().unwrap() = reader_stream;
        self.shared.lock().unwrap().state = SessionState::Running;
        Ok(())
    }
}

enum DispatchOutcome {
    Progress,
    TimedOut,
}

fn reader_loop(inner: Arc<Inner>) {
    'outer: loop {
        if inner.stop.load(Ordering::Relaxed) {
            break;
        }
        let mut stream = match inner.reader_stream.lock().unwrap().try_clone() {
            Ok(s) => s,
            Err(e) => {
                error!("failed to clone reader socket: {}", e);
                break;
            }
        };
        loop {
            if inner.stop.load(Ordering::Relaxed) {
                break 'outer;
            }
            match read_and_dispatch_one(&mut stream, &inner) {
                Ok(DispatchOutcome::Progress) | Ok(DispatchOutcome::TimedOut) => continue,
                Err(VncError::ConnectionLost) => {
                    warn!("connection lost; reconnecting");
                    if inner.reconnect().is_err() {
                        break 'outer;
                    }
                    continue 'outer;
                }
                Err(e) => {
                    error!("fatal protocol error, stopping reader: {}", e);
                    break 'outer;
                }
            }
        }
    }
    let mut shared = inner.shared.lock().unwrap();
    shared.state = SessionState::Disconnected;
    drop(shared);
    inner.update_cond.notify_all();
}

fn read_and_dispatch_one(stream: &mut TcpStream, inner: &Arc<Inner>) -> Result<DispatchOutcome> {
    let msg_type = match try_read_type(stream)? {
        Some(t) => t,
        None => return Ok(DispatchOutcome::TimedOut),
    };
    match msg_type {
        0 => dispatch_framebuffer_update(stream, inner)?,
        1 => dispatch_set_colour_map_entries(stream, &inner.stop)?,
        2 => trace!("<- Bell"),
        3 => dispatch_server_cut_text(stream, &inner.stop)?,
        other => return Err(VncError::ProtocolViolation(other)),
    }
    Ok(DispatchOutcome::Progress)
}

/// A single non-looping read attempt for the next message type byte.
/// A socket-level read timeout (`recv_timeout`) is reported as
/// `Ok(None)` so the reader loop can re-check `stop` instead of treating
/// it as an error; a timeout between messages is not a protocol failure.
fn try_read_type(stream: &mut TcpStream) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    match stream.read(&mut buf) {
        Ok(0) => Err(VncError::ConnectionLost),
        Ok(_) => Ok(Some(buf[0])),
        Err(ref e)
            if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
        {
            Ok(None)
        }
        Err(ref e) if e.kind() == io::ErrorKind::Interrupted => try_read_type(stream),
        Err(e) => Err(VncError::Io(e)),
    }
}

/// Reads of a message body use the `_checked` wire helpers (not the plain
/// ones `handshake.rs` uses): the reader stream carries `recv_timeout`, so
/// a read can time out mid-message and must be retried rather than
/// treated as a fatal I/O error, while still re-checking `stop` on every
/// retry so a shutdown request isn't stuck behind a stalled peer.
fn dispatch_framebuffer_update(stream: &mut TcpStream, inner: &Arc<Inner>) -> Result<()> {
    let stop = &inner.stop;
    let _padding = wire::read_u8_checked(stream, stop)?;
    let count = wire::read_u16_checked(stream, stop)?;
    let bpp = inner.shared.lock().unwrap().pixel_format.bytes_per_pixel();

    let mut pending_resize = None;
    let mut rects = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let x = wire::read_u16_checked(stream, stop)?;
        let y = wire::read_u16_checked(stream, stop)?;
        let w = wire::read_u16_checked(stream, stop)?;
        let h = wire::read_u16_checked(stream, stop)?;
        let encoding = wire::read_i32_checked(stream, stop)?;
        match encoding {
            -223 => pending_resize = Some((w, h)), // DesktopSize; last one wins
            0 => {
                let data = wire::read_vec_checked(stream, w as usize * h as usize * bpp, stop)?;
                rects.push((x, y, w, h, data));
            }
            other => return Err(VncError::UnsupportedEncoding(other)),
        }
    }

    let mut shared = inner.shared.lock().unwrap();
    if let Some((w, h)) = pending_resize {
        debug!("<- DesktopSize {}x{}", w, h);
        shared.framebuffer.resize(w, h);
    }
    for (x, y, w, h, data) in rects {
        shared.framebuffer.set_pixels(x, y, w, h, &data)?;
    }
    shared.framebuffer_updated = true;
    drop(shared);
    inner.update_cond.notify_all();
    Ok(())
}

fn dispatch_set_colour_map_entries(stream: &mut TcpStream, stop: &AtomicBool) -> Result<()> {
    let _padding = wire::read_u8_checked(stream, stop)?;
    let _first_colour = wire::read_u16_checked(stream, stop)?;
    let count = wire::read_u16_checked(stream, stop)?;
    let _drained = wire::read_vec_checked(stream, count as usize * 6, stop)?;
    trace!("<- SetColourMapEntries ({} entries, drained)", count);
    Ok(())
}

fn dispatch_server_cut_text(stream: &mut TcpStream, stop: &AtomicBool) -> Result<()> {
    let _padding = wire::read_vec_checked(stream, 3, stop)?;
    let len = wire::read_u32_checked(stream, stop)? as usize;
    let _drained = wire::read_vec_checked(stream, len, stop)?;
    trace!("<- ServerCutText ({} bytes, drained)", len);
    Ok(())
}
