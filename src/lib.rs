//! # Reparto (Users & Groups for Shared Expenses)
//!
//! `reparto` registers users, issues JWT token pairs, and manages the groups
//! those users split expenses in.
//!
//! ## Authentication
//!
//! Users log in with their email and password. Passwords are stored as
//! Argon2id hashes. A successful login or registration returns a short-lived
//! **access** token and a longer-lived **refresh** token, both HS256 JWTs.
//! Protected endpoints expect `Authorization: Bearer <access>`.
//!
//! ## Groups & Membership
//!
//! A group is a named collection of users. The creator is always a member and
//! can never be removed. Adding a member is idempotent: adding an existing
//! member succeeds without creating a second row. Groups are only visible to
//! their members; everyone else gets `404 Not Found`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
