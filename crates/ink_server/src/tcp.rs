//! The line-framed TCP tile protocol.
//!
//! A client sends one ASCII request line and gets back either the raw pixel
//! payload (no header, no framing: exactly the bytes it writes into its
//! framebuffer) or a single `ERROR:` line. Either way the connection is then
//! closed. This keeps the client side down to one fixed-size buffer and one
//! read.
//!
//! ```text
//! webInkV1 <api_key> <device> <mode> <x> <y> <w> <h> <format>\n
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use tokio::io::AsyncWriteExt as _;
use tokio::net::{TcpListener, TcpStream};

use ink_codec::RawFormat;
use ink_types::Mode;

use crate::App;

pub const PROTOCOL_NAME: &str = "webInkV1";

const MAX_REQUEST_LINE: usize = 512;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------

/// Accept connections forever, one task per connection.
pub async fn serve(app: Arc<App>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(app.clone(), stream, peer));
            }
            Err(err) => {
                ink_log::warn!("[socket] failed to accept connection: {err}");
            }
        }
    }
}

async fn handle_connection(app: Arc<App>, mut stream: TcpStream, peer: SocketAddr) {
    ink_log::debug!("[socket] new connection from {peer}");

    let line = match tokio::time::timeout(REQUEST_TIMEOUT, read_request_line(&mut stream)).await {
        Ok(Ok(line)) => line,
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::InvalidData => {
            // Oversized or non-UTF-8 request line.
            ink_log::warn!("[socket] unreadable request line from {peer}: {err}");
            let _ = stream.write_all(b"ERROR: invalid request line\n").await;
            let _ = stream.shutdown().await;
            return;
        }
        Ok(Err(err)) => {
            ink_log::warn!("[socket] failed to read request from {peer}: {err}");
            return;
        }
        Err(_) => {
            // Timed out: close without writing anything.
            ink_log::warn!("[socket] timed out reading request from {peer}");
            return;
        }
    };

    ink_log::debug!("[socket] request from {peer}: {line}");

    match respond(&app, &line) {
        Ok(payload) => {
            if let Err(err) = stream.write_all(&payload).await {
                ink_log::warn!("[socket] failed to send payload to {peer}: {err}");
            } else {
                ink_log::info!("[socket] sent {} bytes to {peer}", payload.len());
            }
        }
        Err(message) => {
            ink_log::warn!("[socket] rejected request from {peer}: {message}");
            let _ = stream.write_all(format!("ERROR: {message}\n").as_bytes()).await;
        }
    }

    let _ = stream.shutdown().await;
}

async fn read_request_line(stream: &mut TcpStream) -> std::io::Result<String> {
    use tokio::io::{AsyncBufReadExt as _, AsyncReadExt, BufReader};

    // The limit counts the line itself; leave room for the terminator.
    let limited = AsyncReadExt::take(&mut *stream, MAX_REQUEST_LINE as u64 + 2);
    let mut reader = BufReader::new(limited);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    if line.trim_end_matches(['\r', '\n']).len() > MAX_REQUEST_LINE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "request line too long",
        ));
    }

    Ok(line.trim().to_owned())
}

// ----------------------------------------------------------------------------

/// Validate a request line and produce the raw payload.
///
/// The first failed check wins and becomes the `ERROR:` line.
fn respond(app: &App, line: &str) -> Result<Vec<u8>, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let Ok([protocol, api_key, device, mode_str, x_str, y_str, w_str, h_str, format_str]) =
        <[&str; 9]>::try_from(fields.as_slice())
    else {
        return Err(format!(
            "invalid request format. expected 9 fields, got {}",
            fields.len()
        ));
    };

    if protocol != PROTOCOL_NAME {
        return Err(format!(
            "unsupported protocol {protocol:?}. expected {PROTOCOL_NAME:?}"
        ));
    }

    if !app.check_api_key(api_key) {
        return Err("invalid api key".to_owned());
    }

    let parse_coord = |name: &str, value: &str| {
        value
            .parse::<u32>()
            .map_err(|_| format!("invalid coordinates: {name}={value:?}"))
    };
    let x = parse_coord("x", x_str)?;
    let y = parse_coord("y", y_str)?;
    let w = parse_coord("w", w_str)?;
    let h = parse_coord("h", h_str)?;

    let format: RawFormat = format_str.parse().map_err(|_| {
        format!("invalid format {format_str:?}. expected pbm, pgm, or ppm")
    })?;

    app.registry.touch(device, Timestamp::now(), |record| {
        record.mode = Some(mode_str.to_owned());
        record.connection_type = Some("socket".to_owned());
    });

    let mode: Mode = mode_str
        .parse()
        .map_err(|_| format!("unsupported mode: {mode_str}"))?;
    if !app.config.is_supported_mode(mode) {
        return Err(format!("unsupported mode: {mode_str}"));
    }

    let (page_id, _) = app
        .config
        .page_for_device(device)
        .ok_or_else(|| "no page configured for device".to_owned())?;

    let payload = app
        .store
        .crop_raw(page_id, mode, x, y, w, h, format)
        .map_err(|err| err.to_string())?;
    debug_assert_eq!(payload.len(), format.payload_len(w, h));
    Ok(payload)
}

// ----------------------------------------------------------------------------
