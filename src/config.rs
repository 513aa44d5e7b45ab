//! Pixel format descriptor (C2) and session configuration (§6).

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::wire;

/// The 16-byte `PIXEL_FORMAT` record exchanged during the handshake.
///
/// Invariant: `bits_per_pixel` is one of `8`, `16`, `32`. The screenshot
/// path only understands the [`PixelFormat::default`] 32bpp BGRX layout;
/// advertising anything else is legal but the framebuffer store remains
/// format-agnostic and simply stores whatever cells arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian_flag: bool,
    pub true_color_flag: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel as usize / 8
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<PixelFormat> {
        let bits_per_pixel = wire::read_u8(reader)?;
        let depth = wire::read_u8(reader)?;
        let big_endian_flag = wire::read_u8(reader)? != 0;
        let true_color_flag = wire::read_u8(reader)? != 0;
        let red_max = wire::read_u16(reader)?;
        let green_max = wire::read_u16(reader)?;
        let blue_max = wire::read_u16(reader)?;
        let red_shift = wire::read_u8(reader)?;
        let green_shift = wire::read_u8(reader)?;
        let blue_shift = wire::read_u8(reader)?;
        let _padding = wire::read_vec(reader, 3)?;
        Ok(PixelFormat {
            bits_per_pixel,
            depth,
            big_endian_flag,
            true_color_flag,
            red_max,
            green_max,
            blue_max,
            red_shift,
            green_shift,
            blue_shift,
        })
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        wire::write_u8(writer, self.bits_per_pixel)?;
        wire::write_u8(writer, self.depth)?;
        wire::write_u8(writer, self.big_endian_flag as u8)?;
        wire::write_u8(writer, self.true_color_flag as u8)?;
        wire::write_u16(writer, self.red_max)?;
        wire::write_u16(writer, self.green_max)?;
        wire::write_u16(writer, self.blue_max)?;
        wire::write_u8(writer, self.red_shift)?;
        wire::write_u8(writer, self.green_shift)?;
        wire::write_u8(writer, self.blue_shift)?;
        wire::write_all(writer, &[0u8; 3])?;
        Ok(())
    }
}

impl Default for PixelFormat {
    /// 32bpp little-endian true-colour BGRX, the only format the
    /// screenshot path supports.
    fn default() -> Self {
        PixelFormat {
            bits_per_pixel: 32,
            depth: 32,
            big_endian_flag: false,
            true_color_flag: true,
            red_max: 65280,
            green_max: 65280,
            blue_max: 65280,
            red_shift: 0,
            green_shift: 8,
            blue_shift: 16,
        }
    }
}

/// Configuration accepted by [`crate::Client::connect`].
///
/// Built with a setter-chain style rather than exposing all fields as
/// public struct literals, so future fields can be added without
/// breaking callers.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) hostname: String,
    pub(crate) port: u16,
    pub(crate) password: Option<String>,
    pub(crate) share: bool,
    pub(crate) pixel_format: PixelFormat,
    pub(crate) recv_timeout: Duration,
    pub(crate) log_level: log::LevelFilter,
    pub(crate) retry_budget: Option<u32>,
    pub(crate) retry_backoff: Duration,
}

impl SessionConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        SessionConfig {
            hostname: hostname.into(),
            port: 5900,
            password: None,
            share: false,
            pixel_format: PixelFormat::default(),
            recv_timeout: Duration::from_secs(1),
            log_level: log::LevelFilter::Info,
            retry_budget: None,
            retry_backoff: Duration::from_millis(500),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn share(mut self, share: bool) -> Self {
        self.share = share;
        self
    }

    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Sets the filter an embedder wants applied via
    /// [`log::set_max_level`]. This is a convenience for callers who
    /// want a hard-coded level rather than configuring `RUST_LOG`; read
    /// it back with [`SessionConfig::configured_log_level`] and apply it
    /// yourself, since setting the global max level is a process-wide
    /// side effect this crate never performs implicitly.
    pub fn log_level(mut self, level: log::LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    /// The level set via [`SessionConfig::log_level`], `Info` by default.
    pub fn configured_log_level(&self) -> log::LevelFilter {
        self.log_level
    }

    /// Maximum number of reconnection attempts after a `ConnectionLost`
    /// error before giving up and propagating it to the caller. `None`
    /// (the default) retries forever.
    pub fn retry_budget(mut self, attempts: u32) -> Self {
        self.retry_budget = Some(attempts);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}
