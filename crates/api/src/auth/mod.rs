//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- HS256 credentials for users (access/refresh) and nodes.

pub mod jwt;
pub mod password;
