//! Route handlers, one module per resource
//!
//! - `home`: Landing page
//! - `health`: Health check endpoint
//! - `auth`: Login and logout
//! - `users`: Registration and self-service user management
//! - `statuses`, `labels`: Reference data for tasks
//! - `tasks`: Tasks, their filter and their detail page
//! - `forms`: Helpers shared by the entity forms

pub mod auth;
pub mod forms;
pub mod health;
pub mod home;
pub mod labels;
pub mod statuses;
pub mod tasks;
pub mod users;
