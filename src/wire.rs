//! Big-endian primitive codec for the RFB wire format.
//!
//! Every multi-byte integer on the wire is big-endian; this module is the
//! only place that is allowed to know that. Callers never depend on host
//! byte order.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, VncError};

/// Reads exactly `buf.len()` bytes, looping over short reads until the
/// buffer is full or the connection fails.
///
/// A `read` returning `Ok(0)` before the buffer is full means the peer
/// closed the connection; that is surfaced as [`VncError::ConnectionLost`]
/// rather than a bare I/O error, since the dispatcher and reconnect logic
/// key off that variant specifically. A socket-level read timeout
/// (`WouldBlock`/`TimedOut`) is not a protocol error either: it is
/// retried silently, since it just means no more bytes of this message
/// have arrived yet.
pub fn read_exact_n<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    read_exact_n_checked(reader, buf, None)
}

/// As [`read_exact_n`], but also re-checks `stop` on every timed-out read
/// so a reader loop blocked mid-message can still notice a shutdown
/// request instead of retrying forever.
pub fn read_exact_n_checked<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    stop: Option<&AtomicBool>,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(VncError::ConnectionLost),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                if let Some(stop) = stop {
                    if stop.load(Ordering::Relaxed) {
                        return Err(VncError::ConnectionLost);
                    }
                }
                continue;
            }
            Err(e) => return Err(VncError::Io(e)),
        }
    }
    Ok(())
}

pub fn read_u8<R: Read + ?Sized>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_exact_n(r, &mut buf)?;
    Ok(buf[0])
}

pub fn read_i8<R: Read + ?Sized>(r: &mut R) -> Result<i8> {
    Ok(read_u8(r)? as i8)
}

pub fn read_u16<R: Read + ?Sized>(r: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact_n(r, &mut buf)?;
    Ok((&buf[..]).read_u16::<BigEndian>().expect("2-byte buffer"))
}

pub fn read_i16<R: Read + ?Sized>(r: &mut R) -> Result<i16> {
    Ok(read_u16(r)? as i16)
}

pub fn read_u32<R: Read + ?Sized>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact_n(r, &mut buf)?;
    Ok((&buf[..]).read_u32::<BigEndian>().expect("4-byte buffer"))
}

pub fn read_i32<R: Read + ?Sized>(r: &mut R) -> Result<i32> {
    Ok(read_u32(r)? as i32)
}

pub fn read_vec<R: Read + ?Sized>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact_n(r, &mut buf)?;
    Ok(buf)
}

/// Stop-aware counterparts of [`read_u8`]/[`read_u16`]/[`read_i32`]/
/// [`read_vec`], used by the reader loop so a message body read retries
/// across socket timeouts without becoming unresponsive to `stop`.
pub fn read_u8_checked<R: Read + ?Sized>(r: &mut R, stop: &AtomicBool) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_exact_n_checked(r, &mut buf, Some(stop))?;
    Ok(buf[0])
}

pub fn read_u16_checked<R: Read + ?Sized>(r: &mut R, stop: &AtomicBool) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact_n_checked(r, &mut buf, Some(stop))?;
    Ok((&buf[..]).read_u16::<BigEndian>().expect("2-byte buffer"))
}

pub fn read_u32_checked<R: Read + ?Sized>(r: &mut R, stop: &AtomicBool) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact_n_checked(r, &mut buf, Some(stop))?;
    Ok((&buf[..]).read_u32::<BigEndian>().expect("4-byte buffer"))
}

pub fn read_i32_checked<R: Read + ?Sized>(r: &mut R, stop: &AtomicBool) -> Result<i32> {
    Ok(read_u32_checked(r, stop)? as i32)
}

pub fn read_vec_checked<R: Read + ?Sized>(
    r: &mut R,
    len: usize,
    stop: &AtomicBool,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact_n_checked(r, &mut buf, Some(stop))?;
    Ok(buf)
}

pub fn write_u8<W: Write + ?Sized>(w: &mut W, v: u8) -> Result<()> {
    w.write_u8(v).map_err(VncError::Io)
}

pub fn write_u16<W: Write + ?Sized>(w: &mut W, v: u16) -> Result<()> {
    w.write_u16::<BigEndian>(v).map_err(VncError::Io)
}

pub fn write_u32<W: Write + ?Sized>(w: &mut W, v: u32) -> Result<()> {
    w.write_u32::<BigEndian>(v).map_err(VncError::Io)
}

pub fn write_i32<W: Write + ?Sized>(w: &mut W, v: i32) -> Result<()> {
    w.write_i32::<BigEndian>(v).map_err(VncError::Io)
}

pub fn write_all<W: Write + ?Sized>(w: &mut W, buf: &[u8]) -> Result<()> {
    w.write_all(buf).map_err(VncError::Io)
}
