//! Authentication and authorization
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and new-password rules
//! - [`session_token`]: Session cookie tokens and their SHA-256 digests
//! - [`caller`]: The identity resolved from a request's session
//! - [`authorization`]: Authentication and ownership checks
//!
//! # Example
//!
//! ```
//! use taskmanager_shared::auth::authorization::{AccessCheck, Authenticated};
//! use taskmanager_shared::auth::caller::Caller;
//! use taskmanager_shared::auth::password::{hash_password, verify_password};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("pw1")?;
//! assert!(verify_password("pw1", &hash)?);
//!
//! assert!(!Authenticated.check(&Caller::anonymous(), "/labels/").is_allowed());
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod caller;
pub mod password;
pub mod session_token;
