use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over `data`, hex-encoded. This is the signature format the gateway attaches to webhook deliveries.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Check an HMAC-SHA256 signature against `data`. Gateway deliveries have used both hex and base64 encodings for
/// the digest, so both are accepted. The comparison is constant-time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let Some(decoded) = hex::decode(signature).ok().or_else(|| BASE64.decode(signature).ok()) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    mac.verify_slice(&decoded).is_ok()
}
