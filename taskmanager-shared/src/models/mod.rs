//! Database models
//!
//! Each model exposes associated async functions taking a `&PgPool`, in the
//! style `Status::create(&pool, "new")`. Deletes of referenced entities
//! return [`crate::db::deletion::DeleteResult`] instead of failing.

pub mod label;
pub mod message;
pub mod session;
pub mod status;
pub mod task;
pub mod user;
