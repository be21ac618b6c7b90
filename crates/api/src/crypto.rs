//! Cryptographic helpers for authentication.
//!
//! - random session / state / invite tokens (hex)
//! - SHA-256 session ids derived from session tokens
//! - PKCE verifier + S256 challenge
//! - HMAC-SHA256 signed transfer tokens for the invited sign-up step

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ServiceError;

/// Transfer token lifetime: 10 minutes in seconds.
pub const TRANSFER_TOKEN_EXPIRY_SECS: u64 = 600;

const SESSION_TOKEN_BYTES: usize = 20;
const STATE_TOKEN_BYTES: usize = 32;
const INVITE_CODE_BYTES: usize = 16;
const CODE_VERIFIER_BYTES: usize = 32;

// ── Random tokens ───────────────────────────────────────────────────────────

fn random_bytes<const N: usize>() -> Result<[u8; N], ServiceError> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(bytes)
}

/// Generate the raw session token handed to the browser. Returns hex-encoded.
pub fn generate_session_token() -> Result<String, ServiceError> {
    Ok(hex::encode(random_bytes::<SESSION_TOKEN_BYTES>()?))
}

/// Generate a CSRF state token for the OAuth redirect.
pub fn generate_state_token() -> Result<String, ServiceError> {
    Ok(hex::encode(random_bytes::<STATE_TOKEN_BYTES>()?))
}

/// Generate a new invite code.
pub fn generate_invite_code() -> Result<String, ServiceError> {
    Ok(hex::encode(random_bytes::<INVITE_CODE_BYTES>()?))
}

/// Session id stored in the database: hex(sha256(token)).
///
/// Only the hash is persisted, so a leaked `sessions` table cannot be replayed.
pub fn session_id_for(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ── PKCE ────────────────────────────────────────────────────────────────────

/// Generate a PKCE code verifier (43 chars, base64url without padding).
pub fn generate_code_verifier() -> Result<String, ServiceError> {
    Ok(URL_SAFE_NO_PAD.encode(random_bytes::<CODE_VERIFIER_BYTES>()?))
}

/// S256 code challenge for a verifier: base64url(sha256(verifier)).
pub fn code_challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

// ── Transfer tokens ─────────────────────────────────────────────────────────

/// Provider identity carried from the OAuth callback to invite redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingIdentity {
    pub provider_user_id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct TransferClaims {
    #[serde(flatten)]
    identity: PendingIdentity,
    exp: u64,
}

/// Sign a transfer token: `base64url(claims_json).base64url(hmac)`.
pub fn sign_transfer_token(
    identity: &PendingIdentity,
    secret: &[u8],
    now_unix: u64,
) -> Result<String, ServiceError> {
    let claims = TransferClaims {
        identity: identity.clone(),
        exp: now_unix + TRANSFER_TOKEN_EXPIRY_SECS,
    };
    let payload = serde_json::to_vec(&claims)
        .map_err(|e| ServiceError::Internal(format!("encode transfer token: {e}")))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let sig_b64 = URL_SAFE_NO_PAD.encode(hmac_sha256(secret, payload_b64.as_bytes()));
    Ok(format!("{payload_b64}.{sig_b64}"))
}

/// Verify a transfer token and return the identity it carries.
pub fn verify_transfer_token(
    token: &str,
    secret: &[u8],
    now_unix: u64,
) -> Result<PendingIdentity, ServiceError> {
    let (payload_b64, sig_b64) = token
        .trim()
        .split_once('.')
        .ok_or_else(|| ServiceError::Unauthorized("invalid transfer token format".into()))?;

    let actual_sig = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| ServiceError::Unauthorized("invalid transfer token signature".into()))?;
    let mut mac = new_mac(secret);
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&actual_sig)
        .map_err(|_| ServiceError::Unauthorized("invalid transfer token signature".into()))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| ServiceError::Unauthorized("invalid transfer token payload".into()))?;
    let claims: TransferClaims = serde_json::from_slice(&payload)
        .map_err(|_| ServiceError::Unauthorized("invalid transfer token payload".into()))?;

    let identity = claims.identity;
    if identity.provider_user_id.is_empty() || identity.email.is_empty() || identity.name.is_empty()
    {
        return Err(ServiceError::Unauthorized(
            "transfer token missing identity fields".into(),
        ));
    }
    if now_unix >= claims.exp {
        return Err(ServiceError::Unauthorized("transfer token expired".into()));
    }

    Ok(identity)
}

/// Generate a random HMAC key for processes started without a configured one.
pub fn generate_secret() -> Result<Vec<u8>, ServiceError> {
    Ok(random_bytes::<32>()?.to_vec())
}

// ── Internal ────────────────────────────────────────────────────────────────

fn new_mac(key: &[u8]) -> Hmac<Sha256> {
    Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";
    const NOW: u64 = 1_700_000_000;

    fn identity() -> PendingIdentity {
        PendingIdentity {
            provider_user_id: "1234567890".into(),
            email: "new@example.com".into(),
            name: "New User".into(),
            picture: None,
        }
    }

    #[test]
    fn session_token_hashes_to_stable_hex_id() {
        let token = generate_session_token().unwrap();
        assert_eq!(token.len(), SESSION_TOKEN_BYTES * 2);
        let id = session_id_for(&token);
        assert_eq!(id.len(), 64);
        assert_eq!(id, session_id_for(&token));
        assert_ne!(id, session_id_for("other"));
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(generate_state_token().unwrap(), generate_state_token().unwrap());
        assert_ne!(generate_invite_code().unwrap(), generate_invite_code().unwrap());
    }

    #[test]
    fn pkce_challenge_matches_rfc7636_example() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge_s256(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
        assert_eq!(generate_code_verifier().unwrap().len(), 43);
    }

    #[test]
    fn transfer_token_verifies_within_lifetime() {
        let token = sign_transfer_token(&identity(), SECRET, NOW).unwrap();
        let got = verify_transfer_token(&token, SECRET, NOW + 599).unwrap();
        assert_eq!(got, identity());
    }

    #[test]
    fn transfer_token_expires_at_exp() {
        let token = sign_transfer_token(&identity(), SECRET, NOW).unwrap();
        let err = verify_transfer_token(&token, SECRET, NOW + TRANSFER_TOKEN_EXPIRY_SECS)
            .unwrap_err();
        assert_eq!(err.message(), "transfer token expired");
    }

    #[test]
    fn transfer_token_rejects_wrong_secret_and_tampering() {
        let token = sign_transfer_token(&identity(), SECRET, NOW).unwrap();
        assert!(verify_transfer_token(&token, b"other", NOW).is_err());

        let (_, sig) = token.split_once('.').unwrap();
        let forged_identity = PendingIdentity {
            email: "admin@example.com".into(),
            ..identity()
        };
        let forged = sign_transfer_token(&forged_identity, b"attacker", NOW).unwrap();
        let (forged_payload, _) = forged.split_once('.').unwrap();
        let spliced = format!("{forged_payload}.{sig}");
        assert!(verify_transfer_token(&spliced, SECRET, NOW).is_err());

        assert!(verify_transfer_token("no-dot", SECRET, NOW).is_err());
        assert!(verify_transfer_token("", SECRET, NOW).is_err());
    }

    #[test]
    fn transfer_token_requires_identity_fields() {
        let blank = PendingIdentity {
            name: String::new(),
            ..identity()
        };
        let token = sign_transfer_token(&blank, SECRET, NOW).unwrap();
        assert!(verify_transfer_token(&token, SECRET, NOW).is_err());
    }
}
