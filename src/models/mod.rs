//! Data models for Praxis identities.
//!
//! This module contains the data structures shared across the session layer:
//!
//! - `User`: the authenticated identity record
//! - `Role`: coarse authorization category with its dashboard mapping

pub mod user;

pub use user::{Role, User};
