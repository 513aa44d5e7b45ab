//! The handshake engine (C6): protocol version exchange, security
//! negotiation, ClientInit/ServerInit, and the encodings/pixel-format
//! messages that close out session setup.

use std::io::{Read, Write};

use log::debug;

use crate::auth;
use crate::config::{PixelFormat, SessionConfig};
use crate::error::{Result, VncError};
use crate::wire;

const PROTOCOL_VERSION: &[u8; 12] = b"RFB 003.008\n";

const SECURITY_NONE: u8 = 1;
const SECURITY_VNC_AUTH: u8 = 2;

/// What the handshake learned about the server, handed off to the
/// duplex I/O core to seed the session's framebuffer and name.
#[derive(Debug)]
pub struct ServerInfo {
    pub width: u16,
    pub height: u16,
    pub pixel_format: PixelFormat,
    pub name: String,
}

/// Runs the full RFB 3.8 handshake over `stream` and leaves it
/// positioned right after `SetPixelFormat`, ready for the reader thread
/// to take over.
pub fn run<S: Read + Write>(stream: &mut S, config: &SessionConfig) -> Result<ServerInfo> {
    negotiate_version(stream)?;
    negotiate_security(stream, config)?;
    send_client_init(stream, config)?;
    let server_info = read_server_init(stream)?;
    send_set_encodings(stream)?;
    send_set_pixel_format(stream, &config.pixel_format)?;
    Ok(server_info)
}

fn negotiate_version<S: Read + Write>(stream: &mut S) -> Result<()> {
    let mut buf = [0u8; 12];
    wire::read_exact_n(stream, &mut buf)?;
    debug!("<- protocol version {:?}", String::from_utf8_lossy(&buf));
    if &buf != PROTOCOL_VERSION {
        return Err(VncError::UnsupportedProtocol(
            String::from_utf8_lossy(&buf).into_owned(),
        ));
    }
    wire::write_all(stream, PROTOCOL_VERSION)?;
    Ok(())
}

fn read_failure_reason<S: Read>(stream: &mut S) -> Result<String> {
    let len = wire::read_u32(stream)? as usize;
    let bytes = wire::read_vec(stream, len)?;
    Ok(bytes.iter().map(|&b| b as char).collect())
}

fn negotiate_security<S: Read + Write>(stream: &mut S, config: &SessionConfig) -> Result<()> {
    let count = wire::read_u8(stream)?;
    if count == 0 {
        let reason = read_failure_reason(stream)?;
        return Err(VncError::ServerRefused(reason));
    }
    let types = wire::read_vec(stream, count as usize)?;
    debug!("<- security types {:?}", types);

    if types.contains(&SECURITY_NONE) {
        wire::write_u8(stream, SECURITY_NONE)?;
        return Ok(());
    }

    if types.contains(&SECURITY_VNC_AUTH) {
        let password = config.password.as_ref().ok_or(VncError::PasswordRequired)?;
        wire::write_u8(stream, SECURITY_VNC_AUTH)?;

        let mut challenge = [0u8; 16];
        wire::read_exact_n(stream, &mut challenge)?;
        let response = auth::encrypt_challenge(password, &challenge);
        wire::write_all(stream, &response)?;

        let result = wire::read_u32(stream)?;
        if result != 0 {
            let reason = read_failure_reason(stream)?;
            return Err(VncError::ServerRefused(reason));
        }
        return Ok(());
    }

    Err(VncError::UnsupportedSecurityTypes)
}

fn send_client_init<S: Write>(stream: &mut S, config: &SessionConfig) -> Result<()> {
    wire::write_u8(stream, config.share as u8)
}

fn read_server_init<S: Read>(stream: &mut S) -> Result<ServerInfo> {
    let width = wire::read_u16(stream)?;
    let height = wire::read_u16(stream)?;
    let pixel_format = PixelFormat::read_from(stream)?;
    let name_length = wire::read_u32(stream)? as usize;
    let name_bytes = wire::read_vec(stream, name_length)?;
    let name = name_bytes.iter().map(|&b| b as char).collect();
    debug!("<- ServerInit {}x{} {:?}", width, height, name);
    Ok(ServerInfo {
        width,
        height,
        pixel_format,
        name,
    })
}

/// Advertises exactly `[Raw(0), DesktopSize(-223)]`, in that order.
/// The only encodings this client understands.
fn send_set_encodings<S: Write>(stream: &mut S) -> Result<()> {
    wire::write_u8(stream, 2)?; // message type: SetEncodings
    wire::write_u8(stream, 0)?; // padding
    wire::write_u16(stream, 2)?; // number of encodings
    wire::write_i32(stream, 0)?; // Raw
    wire::write_i32(stream, -223)?; // DesktopSize
    Ok(())
}

fn send_set_pixel_format<S: Write>(stream: &mut S, format: &PixelFormat) -> Result<()> {
    wire::write_u8(stream, 0)?; // message type: SetPixelFormat
    wire::write_all(stream, &[0u8; 3])?;
    format.write_to(stream)
}
