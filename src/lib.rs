//! Dropgate - self-hosted file sharing with expiring links.
//!
//! Files are shared through opaque links that expire by time or by download
//! count, may require a password, and may require recipients to sign in with
//! a download account. Every retrieval walks a gate chain that consumes quota
//! atomically and records an audit trail.

pub mod account;
pub mod audit;
pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod download;
pub mod error;
pub mod file;
pub mod logging;
pub mod notify;
pub mod team;
pub mod web;

pub use auth::{hash_password, validate_password, verify_password, PasswordError};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository};
pub use error::{DropgateError, Result};
