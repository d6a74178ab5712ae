//! Access and refresh tokens.
//!
//! Both tokens are HS256 JWTs signed with the same key. The `token_type`
//! claim keeps them apart: a refresh token is never accepted where an access
//! token is expected, and the other way round.

use jsonwebtoken::{decode, encode, get_current_timestamp, Algorithm, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;
use utoipa::ToSchema;

use super::state::AuthState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub user_id: i64,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("wrong token type, expected {expected:?}")]
    WrongType { expected: TokenType },
}

fn now_unix() -> i64 {
    i64::try_from(get_current_timestamp()).unwrap_or(i64::MAX)
}

fn claims_for(state: &AuthState, user_id: i64, token_type: TokenType) -> Claims {
    let ttl = match token_type {
        TokenType::Access => state.config().access_ttl_seconds(),
        TokenType::Refresh => state.config().refresh_ttl_seconds(),
    };
    let iat = now_unix();
    Claims {
        token_type,
        user_id,
        iss: state.config().issuer().to_string(),
        iat,
        exp: iat.saturating_add(ttl),
        jti: Ulid::new().to_string(),
    }
}

pub(crate) fn sign(state: &AuthState, claims: &Claims) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, state.encoding_key()).map_err(TokenError::Encode)
}

/// Issue a fresh access token for `user_id`.
///
/// # Errors
/// Returns an error if signing fails.
pub fn issue_access(state: &AuthState, user_id: i64) -> Result<String, TokenError> {
    sign(state, &claims_for(state, user_id, TokenType::Access))
}

/// Issue a refresh/access pair for `user_id`.
///
/// # Errors
/// Returns an error if signing fails.
pub fn issue_pair(state: &AuthState, user_id: i64) -> Result<TokenPair, TokenError> {
    Ok(TokenPair {
        refresh: sign(state, &claims_for(state, user_id, TokenType::Refresh))?,
        access: issue_access(state, user_id)?,
    })
}

/// Verify signature, issuer and expiry, then require the expected `token_type`.
///
/// # Errors
/// Returns an error if the token is malformed, expired, signed with another key,
/// issued by someone else, or of the wrong type.
pub fn verify(state: &AuthState, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
    let data = decode::<Claims>(token, state.decoding_key(), state.validation())
        .map_err(TokenError::Invalid)?;
    if data.claims.token_type != expected {
        return Err(TokenError::WrongType { expected });
    }
    Ok(data.claims)
}
