//! Text captures of event packet streams
//!
//! One packet per line, four hex bytes separated by whitespace or commas.
//! A `0x` prefix is optional and `#` starts a comment.
//!
//! ```text
//! # note on, cable 0
//! 09 90 40 7F
//! 0x1C, 0xC0, 0x05, 0x00
//! ```

use crate::error::PacketError;
use crate::packet::{EventPacket, PACKET_LEN};

/// Parse a single capture line
///
/// Returns `Ok(None)` for blank and comment-only lines. `line_no` is only
/// used for error reporting.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<EventPacket>, PacketError> {
    let content = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };

    let tokens: Vec<&str> = content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() != PACKET_LEN {
        return Err(PacketError::WrongLength {
            line: line_no,
            found: tokens.len(),
        });
    }

    let mut raw = [0u8; PACKET_LEN];
    for (slot, token) in raw.iter_mut().zip(&tokens) {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        *slot = u8::from_str_radix(digits, 16).map_err(|_| PacketError::InvalidHex {
            line: line_no,
            token: (*token).to_string(),
        })?;
    }

    Ok(Some(EventPacket::from_bytes(raw)))
}

/// Parse a whole capture into packets, in order
pub fn parse_capture(text: &str) -> Result<Vec<EventPacket>, PacketError> {
    let mut packets = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(packet) = parse_line(line, idx + 1)? {
            packets.push(packet);
        }
    }
    tracing::debug!("Parsed {} packets from capture", packets.len());
    Ok(packets)
}
