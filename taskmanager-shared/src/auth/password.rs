//! Password hashing with Argon2id
//!
//! Passwords are stored as PHC strings (`$argon2id$v=19$m=...`), which embed
//! the algorithm, parameters and salt, so verification needs nothing but the
//! stored hash.
//!
//! # Example
//!
//! ```
//! use taskmanager_shared::auth::password::{hash_password, verify_password};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("pw1")?;
//! assert!(verify_password("pw1", &hash)?);
//! assert!(!verify_password("pw2", &hash)?);
//! # Ok(())
//! # }
//! ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 3;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password using Argon2id
///
/// Parameters: 19 MiB memory, 2 passes, 1 lane, 32-byte output, 16-byte
/// random salt from the OS RNG.
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(19456)
        .t_cost(2)
        .p_cost(1)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password and an error only when the hash
/// itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // A PHC string without an output segment parses but can never match
    if parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash("Missing hash output".to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a new password and its confirmation
///
/// Returns the field name and message of the first problem found, matching
/// the registration form's `password1`/`password2` fields.
pub fn validate_new_password(
    password: &str,
    confirmation: &str,
) -> Result<(), (&'static str, String)> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err((
            "password1",
            format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }

    if password != confirmation {
        return Err((
            "password2",
            "The two password fields didn’t match.".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password").expect("Hash 1 should succeed");
        let hash2 = hash_password("same_password").expect("Hash 2 should succeed");

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("pw1").expect("Hash should succeed");

        assert!(verify_password("pw1", &hash).expect("Verify should succeed"));
        assert!(!verify_password("pw2", &hash).expect("Verify should succeed"));
        assert!(!verify_password("", &hash).expect("Verify should succeed"));
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash").is_err());
        assert!(verify_password("password", "$argon2id$invalid").is_err());
        assert!(matches!(
            verify_password("password", "$argon2id$v=19$m=19456,t=2,p=1"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_validate_new_password_accepts_short_but_valid() {
        assert!(validate_new_password("abc", "abc").is_ok());
        assert!(validate_new_password("пар", "пар").is_ok());
    }

    #[test]
    fn test_validate_new_password_too_short() {
        let (field, message) = validate_new_password("ab", "ab").unwrap_err();
        assert_eq!(field, "password1");
        assert!(message.contains("at least 3 characters"));
    }

    #[test]
    fn test_validate_new_password_mismatch() {
        let (field, message) = validate_new_password("secret", "secreT").unwrap_err();
        assert_eq!(field, "password2");
        assert!(message.contains("didn’t match"));
    }
}
