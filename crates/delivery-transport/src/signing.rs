//! Payload signing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign a serialized payload with the shared secret.
///
/// Returns the lowercase hex HMAC-SHA256 digest, or an empty string when no
/// secret is configured (unauthenticated collectors accept `auth: ""`).
pub fn sign_payload(secret: &str, data: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }

    // HMAC accepts keys of any length, new_from_slice cannot fail here
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
