//! A synchronous RFB 3.8 client for unattended automation.
//!
//! [`Client::connect`] runs the full handshake (version, security, init,
//! encodings, pixel format) and hands back a [`Client`] whose background
//! reader thread keeps a [`Framebuffer`] up to date while the calling
//! thread drives keyboard and pointer input and, when it wants pixels,
//! calls [`Client::refresh_framebuffer`] or [`Client::screenshot`].
//!
//! ```no_run
//! use rfb_autoclient::{Client, SessionConfig};
//!
//! # fn main() -> rfb_autoclient::Result<()> {
//! let config = SessionConfig::new("192.0.2.10").password("hunter2");
//! let mut client = Client::connect(config)?;
//! client.left_click(100, 200)?;
//! client.press_key('a', None)?;
//! let pixels = client.screenshot()?;
//! client.stop()?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod config;
mod error;
mod framebuffer;
mod handshake;
mod keysym;
mod session;
mod wire;

pub use config::{PixelFormat, SessionConfig};
pub use error::{Result, VncError};
pub use framebuffer::Framebuffer;
pub use keysym::Key;
pub use session::{Client, SessionState};
