use rand::{RngCore, rngs::OsRng};

/// Returns a fresh 16-hex-character identifier. Used for both request ids
/// and approval tickets, so the bytes come from the OS entropy source.
pub fn new_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
