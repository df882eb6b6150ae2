//! Database layer for the task manager
//!
//! # Modules
//!
//! - `pool`: PostgreSQL connection pool management with health checks
//! - `migrations`: Embedded schema migrations
//! - `deletion`: Result type for deletes guarded by foreign keys
//!
//! Models live in the `models` module at crate root level.
//!
//! # Example
//!
//! ```no_run
//! use taskmanager_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig {
//!         url: std::env::var("DATABASE_URL")?,
//!         ..Default::default()
//!     };
//!
//!     let pool = create_pool(config).await?;
//!     Ok(())
//! }
//! ```

pub mod deletion;
pub mod migrations;
pub mod pool;
