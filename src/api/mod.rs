//! REST API client module for the Praxis Auth service.
//!
//! This module provides the `AuthApi` trait and its reqwest-backed
//! `HttpAuthClient` implementation, plus the `AuthError` taxonomy that all
//! transport and HTTP failures are classified into.
//!
//! The API uses bearer token authentication; the token is obtained through
//! `POST /auth/login` and verified through `GET /auth/me`.

pub mod client;
pub mod error;

pub use client::{AuthApi, HttpAuthClient, LoginResponse};
pub use error::{AuthError, UserMessage};
