//! Token issuance, password handling and principal extraction.
//!
//! Flow Overview:
//! 1) Registration and login hash or verify the password (Argon2id).
//! 2) A refresh/access JWT pair is issued for the user.
//! 3) Protected handlers call `principal::require_auth` with the request headers.
//! 4) `/users/token/refresh/` trades a refresh token for a new access token.

pub mod password;
pub mod principal;
pub mod state;
pub mod tokens;

pub use state::{AuthConfig, AuthState};
