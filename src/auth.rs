//! PIN credential hashing and the opaque session token.
//!
//! Tokens carry no server-side state: `role:id:issued-at-millis`,
//! hex-encoded. Good enough for the kiosk-style login this service needs;
//! handlers only ever treat them as opaque strings handed back by clients.

use crate::domain::Role;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a PIN, the stored credential form.
pub fn hash_pin(pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_pin(pin: &str, pin_hash: &str) -> bool {
    hash_pin(pin) == pin_hash
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub role: Role,
    pub user_id: String,
    pub issued_at_millis: i64,
}

pub fn issue_token(role: Role, user_id: &str, issued_at_millis: i64) -> String {
    let role_str = match role {
        Role::Admin => "ADMIN",
        Role::Driver => "DRIVER",
    };
    hex::encode(format!("{role_str}:{user_id}:{issued_at_millis}"))
}

/// Decodes a token back into its claims. Returns `None` for anything that
/// is not a well-formed token; callers map that to 401.
pub fn parse_token(token: &str) -> Option<TokenClaims> {
    let bytes = hex::decode(token).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let mut parts = decoded.splitn(3, ':');
    let role = match parts.next()? {
        "ADMIN" => Role::Admin,
        "DRIVER" => Role::Driver,
        _ => return None,
    };
    let user_id = parts.next()?.to_string();
    let issued_at_millis: i64 = parts.next()?.parse().ok()?;
    Some(TokenClaims {
        role,
        user_id,
        issued_at_millis,
    })
}
