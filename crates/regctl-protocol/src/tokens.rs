//! The two out-of-band byte sequences that fall outside the six-hex-digit
//! frame alphabet (spec §3, §6).

/// Sent by the server immediately after accepting a connection.
pub const ACK: &[u8; 3] = b"ACK";

/// Sent by the client to request a graceful close.
pub const EXIT: &[u8; 4] = b"exit";
