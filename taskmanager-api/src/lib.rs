//! # Task Manager API Server Library
//!
//! The HTTP side of the task manager: users register, log in, and manage
//! statuses, labels and tasks. Every mutation answers with a redirect that
//! carries one notification for the next rendered page.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Session resolution, authentication gate, security headers
//! - `response`: Redirects with notices and rendered pages
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
