//! Utility functions for identifier generation

use uuid7::uuid7;

/// Length of a generated listing identifier.
pub const LISTING_ID_LEN: usize = 15;

// construct a unique listing id: hash a fresh uuid7 and keep a short prefix
pub fn new_listing_id() -> String {
    let digest = sha256::digest(uuid7().as_bytes().as_slice());
    digest[..LISTING_ID_LEN].to_string()
}
