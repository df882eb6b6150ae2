//! Session cookie tokens
//!
//! The browser holds a random token in the `sessionid` cookie; the database
//! stores only its SHA-256 digest, so a leaked `sessions` table cannot be
//! replayed as cookies.
//!
//! # Example
//!
//! ```
//! use taskmanager_shared::auth::session_token::{generate_token, hash_token, is_well_formed};
//!
//! let (token, hash) = generate_token();
//! assert!(is_well_formed(&token));
//! assert_eq!(hash, hash_token(&token));
//! ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a session token, in characters
pub const TOKEN_LENGTH: usize = 32;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "sessionid";

/// Generates a new session token
///
/// Returns `(plaintext_token, sha256_hex)`. Only the hash is persisted.
pub fn generate_token() -> (String, String) {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    let token: String = (0..TOKEN_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let hash = hash_token(&token);

    (token, hash)
}

/// Hex-encoded SHA-256 of a token (64 characters)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cheap shape check before touching the database
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extracts the session token from a `Cookie` header value
///
/// ```
/// use taskmanager_shared::auth::session_token::token_from_cookie_header;
///
/// assert_eq!(token_from_cookie_header("a=1; sessionid=abc; b=2"), Some("abc"));
/// assert_eq!(token_from_cookie_header("a=1"), None);
/// ```
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Builds the `Set-Cookie` value for a session token
pub fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let (token, hash) = generate_token();

        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(is_well_formed(&token));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_generated_tokens_differ() {
        let (first, _) = generate_token();
        let (second, _) = generate_token();
        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn test_is_well_formed_rejects_garbage() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"!".repeat(TOKEN_LENGTH)));
    }

    #[test]
    fn test_token_from_cookie_header() {
        assert_eq!(token_from_cookie_header("sessionid=tok"), Some("tok"));
        assert_eq!(
            token_from_cookie_header("csrftoken=x;  sessionid=tok ;theme=dark"),
            Some("tok")
        );
        assert_eq!(token_from_cookie_header("sessionid="), None);
        assert_eq!(token_from_cookie_header("othersessionid=tok"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", 60, false);
        assert_eq!(cookie, "sessionid=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=60");
        assert!(session_cookie("tok", 60, true).ends_with("; Secure"));
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }
}
