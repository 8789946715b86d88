//! Chat handle normalization.
//!
//! The WhatsApp client addresses personal chats as `<number>@c.us`.
//! Raw input from the dashboard is usually a bare number; anything that
//! already carries the marker is passed through untouched.

/// Domain marker that identifies a canonical personal chat handle.
pub const CHAT_DOMAIN: &str = "@c.us";

/// Turn a raw recipient identifier into a canonical chat handle.
///
/// No validation of digits, length, or country code is done here. A malformed
/// number is handed to the client as-is and surfaces as a failed send.
pub fn normalize(raw: &str) -> String {
    if raw.contains(CHAT_DOMAIN) {
        raw.to_string()
    } else {
        format!("{raw}{CHAT_DOMAIN}")
    }
}

/// Strip the chat domain from a handle, leaving the bare number.
pub fn bare_number(handle: &str) -> &str {
    handle.strip_suffix(CHAT_DOMAIN).unwrap_or(handle)
}
