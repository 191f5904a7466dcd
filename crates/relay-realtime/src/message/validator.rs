//! Inbound frame validation rules.

use super::types::InboundMessage;

/// Maximum allowed inbound frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16_384;

/// Maximum channel name length.
pub const MAX_CHANNEL_NAME_LEN: usize = 200;

/// Parses and validates a raw inbound frame.
///
/// The error string is suitable for an `INVALID_MESSAGE` error frame.
pub fn parse_inbound(raw: &str) -> Result<InboundMessage, String> {
    if raw.len() > MAX_MESSAGE_SIZE {
        return Err(format!(
            "message exceeds maximum size of {MAX_MESSAGE_SIZE} bytes"
        ));
    }
    if raw.trim().is_empty() {
        return Err("empty message".to_string());
    }

    let msg: InboundMessage =
        serde_json::from_str(raw).map_err(|e| format!("failed to parse message: {e}"))?;

    match &msg {
        InboundMessage::Subscribe { channel } | InboundMessage::Unsubscribe { channel } => {
            validate_channel_name(channel)?;
        }
        InboundMessage::Pong { .. } | InboundMessage::Ping { .. } => {}
    }
    Ok(msg)
}

/// Validates channel name length and character set.
pub fn validate_channel_name(channel: &str) -> Result<(), String> {
    if channel.is_empty() || channel.len() > MAX_CHANNEL_NAME_LEN {
        return Err("invalid channel name length".to_string());
    }

    if !channel
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@'))
    {
        return Err("channel name contains invalid characters".to_string());
    }

    Ok(())
}
