//! Authenticated principal extraction.
//!
//! Reads `Authorization: Bearer <access>`, verifies the token, then loads the
//! user it names. The token is checked before the database is touched.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use sqlx::PgPool;
use tracing::debug;

use super::{
    state::AuthState,
    tokens::{verify, TokenType},
};
use crate::api::handlers::{
    error::ApiError,
    users::storage::{fetch_user_by_id, UserRecord},
};

const NOT_PROVIDED: ApiError = ApiError::Unauthorized {
    detail: "Authentication credentials were not provided.",
    code: None,
};

const TOKEN_NOT_VALID: ApiError = ApiError::Unauthorized {
    detail: "Given token not valid for any token type",
    code: Some("token_not_valid"),
};

const BAD_HEADER: ApiError = ApiError::Unauthorized {
    detail: "Authorization header must contain two space-delimited values",
    code: Some("bad_authorization_header"),
};

/// Authenticated user context derived from an access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: UserRecord,
}

impl Principal {
    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.user.id
    }
}

/// Pull the raw token out of a `Bearer` authorization header.
///
/// `Ok(None)` means no bearer credentials were sent at all. The scheme is
/// case-sensitive.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| TOKEN_NOT_VALID)?;
    let mut parts = value.split_whitespace();
    match parts.next() {
        Some("Bearer") => {}
        _ => return Ok(None),
    }
    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(Some(token)),
        _ => Err(BAD_HEADER),
    }
}

/// Resolve the bearer token into a principal, or return the matching 401.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    auth: &AuthState,
) -> Result<Principal, ApiError> {
    let token = bearer_token(headers)?.ok_or(NOT_PROVIDED)?;

    let claims = verify(auth, token, TokenType::Access).map_err(|err| {
        debug!("Rejected access token: {err}");
        TOKEN_NOT_VALID
    })?;

    let Some(user) = fetch_user_by_id(pool, claims.user_id).await? else {
        return Err(ApiError::Unauthorized {
            detail: "User not found",
            code: Some("user_not_found"),
        });
    };

    if !user.is_active {
        return Err(ApiError::Unauthorized {
            detail: "User is inactive",
            code: Some("user_inactive"),
        });
    }

    Ok(Principal { user })
}
