//! Registration, login, token refresh and profile endpoints.
//!
//! Users are identified by email. The email is normalized on the way in and
//! can never be changed afterwards. Passwords only ever leave this module as
//! Argon2id hashes.
//!
//! Flow Overview:
//! 1) Validate the payload into a field-error map (all problems at once).
//! 2) Check uniqueness against the database only once the payload is sound.
//! 3) Persist, then answer with the public `UserProfile` and a token pair.

pub mod storage;
pub mod types;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    auth::{
        password::{hash_password, validate_password, verify_password},
        principal::require_auth,
        tokens::{issue_access, issue_pair, verify, TokenType},
        AuthState,
    },
    check_max_length,
    error::{is_unique_violation, ApiError, ApiJson, FieldErrors, MSG_NULL, MSG_REQUIRED},
    json_body, normalize_email, optional_text, required_raw, required_text, valid_email,
};
use storage::{email_taken, fetch_user_by_email, fetch_user_by_id, insert_user, update_profile};
use types::{
    LoginRequest, LoginResponse, ProfileUpdateRequest, ProfileUpdateResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, RegisterResponse, UserProfile,
};

const EMAIL_MAX: usize = 254;
const NAME_MAX: usize = 150;
const USERNAME_MAX: usize = 150;
const PHONE_MAX: usize = 15;
const PROFILE_PICTURE_MAX: usize = 100;

const MSG_EMAIL_INVALID: &str = "Enter a valid email address.";
const MSG_EMAIL_TAKEN: &str = "user with this email already exists.";
const MSG_PASSWORD_MISMATCH: &str = "Password fields didn't match.";

const NO_ACTIVE_ACCOUNT: ApiError = ApiError::Unauthorized {
    detail: "No active account found with the given credentials",
    code: None,
};

const REFRESH_NOT_VALID: ApiError = ApiError::Unauthorized {
    detail: "Token is invalid or expired",
    code: Some("token_not_valid"),
};

const REFRESH_NO_ACCOUNT: ApiError = ApiError::Unauthorized {
    detail: "No active account found for the given token.",
    code: Some("no_active_account"),
};

#[utoipa::path(
    post,
    path = "/users/register/",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, token pair issued.", body = RegisterResponse),
        (status = 400, description = "Field validation errors keyed by field name."),
    ),
    tag = "users"
)]
/// Creates an account and logs it in straight away.
pub async fn register(
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let mut errors = FieldErrors::new();

    let email = required_text(&mut errors, "email", payload.email.as_ref())
        .map(|email| normalize_email(&email));
    if let Some(email) = &email {
        if !valid_email(email) {
            errors.add("email", MSG_EMAIL_INVALID);
        }
        check_max_length(&mut errors, "email", email, EMAIL_MAX);
    }

    let password = required_raw(&mut errors, "password", payload.password.as_ref());
    let password2 = required_raw(&mut errors, "password2", payload.password2.as_ref());
    if let Some(password) = &password {
        for problem in validate_password(password) {
            errors.add("password", problem);
        }
    }

    let first_name = optional_text(payload.first_name).unwrap_or_default();
    let last_name = optional_text(payload.last_name).unwrap_or_default();
    check_max_length(&mut errors, "first_name", &first_name, NAME_MAX);
    check_max_length(&mut errors, "last_name", &last_name, NAME_MAX);

    let phone_number = optional_text(payload.phone_number);
    if let Some(phone) = &phone_number {
        check_max_length(&mut errors, "phone_number", phone, PHONE_MAX);
    }

    let username = optional_text(payload.username);
    if let Some(username) = &username {
        check_max_length(&mut errors, "username", username, USERNAME_MAX);
    }

    let (Some(email), Some(password), Some(password2)) = (email, password, password2) else {
        return Err(ApiError::Validation(errors));
    };
    errors.into_result()?;

    if email_taken(&pool, &email).await? {
        return Err(ApiError::field("email", MSG_EMAIL_TAKEN));
    }

    if password != password2 {
        return Err(ApiError::field("password", MSG_PASSWORD_MISMATCH));
    }

    let password_hash = hash_password(password).await?;
    let username = username.unwrap_or_else(|| email.clone());

    let user = insert_user(
        &pool,
        &storage::NewUser {
            email: &email,
            username: &username,
            password_hash: &password_hash,
            first_name: &first_name,
            last_name: &last_name,
            phone_number: phone_number.as_deref(),
        },
    )
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::field("email", MSG_EMAIL_TAKEN)
        } else {
            ApiError::Database(err)
        }
    })?;

    let tokens = issue_pair(&auth, user.id).map_err(anyhow::Error::from)?;
    info!(user_id = user.id, "Registered user");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.to_profile(),
            tokens,
            message: "User registered successfully".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/users/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair and profile.", body = LoginResponse),
        (status = 400, description = "Missing email or password."),
        (status = 401, description = "Wrong credentials or inactive account."),
    ),
    tag = "users"
)]
/// Exchanges email and password for a token pair.
pub async fn login(
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let email = required_text(&mut errors, "email", payload.email.as_ref());
    let password = required_raw(&mut errors, "password", payload.password.as_ref());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::Validation(errors));
    };

    let Some(user) = fetch_user_by_email(&pool, &normalize_email(&email)).await? else {
        debug!("Login for unknown email");
        return Err(NO_ACTIVE_ACCOUNT);
    };

    if !verify_password(password, user.password_hash.clone()).await? || !user.is_active {
        debug!(user_id = user.id, "Login rejected");
        return Err(NO_ACTIVE_ACCOUNT);
    }

    let pair = issue_pair(&auth, user.id).map_err(anyhow::Error::from)?;
    Ok(Json(LoginResponse {
        refresh: pair.refresh,
        access: pair.access,
        user: user.to_profile(),
    }))
}

#[utoipa::path(
    post,
    path = "/users/token/refresh/",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh access token.", body = RefreshResponse),
        (status = 400, description = "Missing refresh token."),
        (status = 401, description = "Refresh token invalid, expired or of the wrong type."),
    ),
    tag = "users"
)]
/// Trades a refresh token for a new access token.
pub async fn refresh_token(
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let Some(refresh) = required_text(&mut errors, "refresh", payload.refresh.as_ref()) else {
        return Err(ApiError::Validation(errors));
    };

    let claims = verify(&auth, &refresh, TokenType::Refresh).map_err(|err| {
        debug!("Rejected refresh token: {err}");
        REFRESH_NOT_VALID
    })?;

    match fetch_user_by_id(&pool, claims.user_id).await? {
        Some(user) if user.is_active => {}
        _ => return Err(REFRESH_NO_ACCOUNT),
    }

    let access = issue_access(&auth, claims.user_id).map_err(anyhow::Error::from)?;
    Ok(Json(RefreshResponse { access }))
}

#[utoipa::path(
    get,
    path = "/users/profile/",
    responses(
        (status = 200, description = "Current user.", body = UserProfile),
        (status = 401, description = "Missing or invalid access token."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Json<UserProfile>, ApiError> {
    let principal = require_auth(&headers, &pool, &auth).await?;
    Ok(Json(principal.user.to_profile()))
}

#[utoipa::path(
    put,
    path = "/users/profile/update/",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile replaced.", body = ProfileUpdateResponse),
        (status = 400, description = "Field validation errors keyed by field name."),
        (status = 401, description = "Missing or invalid access token."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
/// Full update. `phone_number` must be present.
pub async fn replace_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    apply_profile_update(&headers, &pool, &auth, &body, false).await
}

#[utoipa::path(
    patch,
    path = "/users/profile/update/",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated.", body = ProfileUpdateResponse),
        (status = 400, description = "Field validation errors keyed by field name."),
        (status = 401, description = "Missing or invalid access token."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
/// Partial update. Absent fields keep their value.
pub async fn patch_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    apply_profile_update(&headers, &pool, &auth, &body, true).await
}

async fn apply_profile_update(
    headers: &HeaderMap,
    pool: &PgPool,
    auth: &AuthState,
    body: &Bytes,
    partial: bool,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    let principal = require_auth(headers, pool, auth).await?;
    let payload: ProfileUpdateRequest = json_body(body)?;
    let current = principal.user;

    let fields = merge_profile(&current, payload, partial)?;
    let Some(updated) = update_profile(pool, current.id, &fields).await? else {
        return Err(ApiError::NotFound);
    };
    info!(user_id = updated.id, "Updated profile");

    Ok(Json(ProfileUpdateResponse {
        user: updated.to_profile(),
        message: "Profile updated successfully".to_string(),
    }))
}

/// Validate the payload and fold it over the stored profile.
fn merge_profile(
    current: &storage::UserRecord,
    payload: ProfileUpdateRequest,
    partial: bool,
) -> Result<storage::ProfileFields, ApiError> {
    let mut errors = FieldErrors::new();

    let mut name_field = |field: &str, value: Option<Option<String>>, existing: &str| match value {
        None => existing.to_string(),
        Some(None) => {
            errors.add(field, MSG_NULL);
            existing.to_string()
        }
        Some(Some(value)) => {
            let value = value.trim().to_string();
            check_max_length(&mut errors, field, &value, NAME_MAX);
            value
        }
    };
    let first_name = name_field("first_name", payload.first_name, &current.first_name);
    let last_name = name_field("last_name", payload.last_name, &current.last_name);

    if !partial && payload.phone_number.is_none() {
        errors.add("phone_number", MSG_REQUIRED);
    }

    let mut nullable_field =
        |field: &str, value: Option<Option<String>>, existing: &Option<String>, max: usize| {
            match value {
                None => existing.clone(),
                Some(None) => None,
                Some(Some(value)) => {
                    let value = value.trim().to_string();
                    check_max_length(&mut errors, field, &value, max);
                    Some(value)
                }
            }
        };

    let phone_number = nullable_field(
        "phone_number",
        payload.phone_number,
        &current.phone_number,
        PHONE_MAX,
    );
    let profile_picture = nullable_field(
        "profile_picture",
        payload.profile_picture,
        &current.profile_picture,
        PROFILE_PICTURE_MAX,
    );
    let username = nullable_field(
        "username",
        payload.username,
        &current.username,
        USERNAME_MAX,
    );

    errors.into_result()?;

    Ok(storage::ProfileFields {
        username,
        first_name,
        last_name,
        phone_number,
        profile_picture,
    })
}
