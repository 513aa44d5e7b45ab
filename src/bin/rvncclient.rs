//! A thin CLI wrapper around the `rfb_autoclient` library: connect, send
//! a click or a keystroke, or dump a screenshot to disk.

use std::fs;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::info;

use rfb_autoclient::{Client, Result, SessionConfig};

#[derive(Parser)]
#[command(name = "rvncclient", about = "A synchronous RFB 3.8 client")]
struct Cli {
    /// VNC server hostname or IP
    host: String,

    /// VNC server port
    #[arg(long, default_value_t = 5900)]
    port: u16,

    /// VNC authentication password, if the server requires one
    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handshake only; print the desktop name and size.
    Connect,
    /// Click the left mouse button at (X, Y).
    Click { x: u16, y: u16 },
    /// Type a string, one key press per character.
    Type { text: String },
    /// Press a single named or raw key (e.g. "enter", "F5").
    Key { name: String },
    /// Write a raw BGRX screenshot (plus a `.txt` size sidecar) to FILE.
    Screenshot { file: String },
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SessionConfig::new(cli.host.clone()).port(cli.port);
    if let Some(password) = cli.password {
        config = config.password(password);
    }
    log::set_max_level(config.configured_log_level());

    info!("connecting to {}:{}", cli.host, cli.port);
    let mut client = Client::connect(config)?;
    info!(
        "connected to {:?} ({}x{})",
        client.name(),
        client.size().0,
        client.size().1
    );

    match cli.command {
        Command::Connect => {}
        Command::Click { x, y } => client.left_click(x, y)?,
        Command::Type { text } => {
            for c in text.chars() {
                client.press_key(c, None)?;
            }
        }
        Command::Key { name } => client.press_key(name.as_str(), None)?,
        Command::Screenshot { file } => {
            let pixels = client.screenshot()?;
            let (width, height) = client.size();
            fs::write(&file, &pixels).map_err(rfb_autoclient::VncError::Io)?;
            fs::write(
                format!("{}.txt", file),
                format!("{}x{} BGRX, {} bytes\n", width, height, pixels.len()),
            )
            .map_err(rfb_autoclient::VncError::Io)?;
        }
    }

    client.stop()?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
