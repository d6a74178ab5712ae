//! Group and membership endpoints.
//!
//! Groups are scoped by membership: every detail route resolves the group
//! through the caller's own membership row, so a group the caller does not
//! belong to answers `404` exactly like a group that does not exist.
//!
//! Flow Overview:
//! 1) Authenticate via bearer access token.
//! 2) Resolve the group by id and verify membership.
//! 3) Apply the change, then answer with the freshly loaded group.

mod storage;
pub mod types;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::{
    auth::{principal::require_auth, AuthState},
    check_max_length,
    error::{ApiError, FieldErrors},
    is_falsy, json_body, parse_path_id, parse_user_id, required_text,
    users::storage::fetch_user_by_id,
};
use storage::{
    create_group as insert_group, delete_group as remove_group, fetch_group_for_member,
    fetch_groups_for_user, load_group, update_group as store_group,
};
use types::{
    CreateGroupRequest, GroupMemberResponse, GroupResponse, MemberMessage, MemberRequest,
    RemoveMemberQuery, UpdateGroupRequest,
};

const GROUP_NAME_MAX: usize = 255;

/// Resolve `{id}` for the caller, hiding groups they do not belong to.
async fn group_for_member(
    pool: &PgPool,
    raw_id: &str,
    user_id: i64,
) -> Result<storage::GroupRow, ApiError> {
    let group_id = parse_path_id(raw_id)?;
    fetch_group_for_member(pool, group_id, user_id)
        .await?
        .ok_or(ApiError::NotFound)
}

fn check_group_name(errors: &mut FieldErrors, name: &str) {
    check_max_length(errors, "name", name, GROUP_NAME_MAX);
}

#[utoipa::path(
    get,
    path = "/groups/",
    responses(
        (status = 200, description = "Groups the caller belongs to, newest first.", body = [GroupResponse]),
        (status = 401, description = "Missing or invalid access token."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn list_groups(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<GroupResponse>>, ApiError> {
    let principal = require_auth(&headers, &pool, &auth).await?;
    let groups = fetch_groups_for_user(&pool, principal.user_id()).await?;
    Ok(Json(groups))
}

#[utoipa::path(
    post,
    path = "/groups/",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created; the caller is its creator and first member.", body = GroupResponse),
        (status = 400, description = "Field validation errors keyed by field name."),
        (status = 401, description = "Missing or invalid access token."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
/// Creates a group owned by the caller and enrolls the requested members.
pub async fn create_group(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<GroupResponse>), ApiError> {
    let principal = require_auth(&headers, &pool, &auth).await?;
    let payload: CreateGroupRequest = json_body(&body)?;

    let mut errors = FieldErrors::new();
    let name = required_text(&mut errors, "name", payload.name.as_ref());
    if let Some(name) = &name {
        check_group_name(&mut errors, name);
    }
    let Some(name) = name else {
        return Err(ApiError::Validation(errors));
    };
    errors.into_result()?;

    let member_ids = payload.member_ids.unwrap_or_default();
    let description = payload.description.map(|text| text.trim().to_string());
    let group_id = insert_group(
        &pool,
        principal.user_id(),
        &name,
        description.as_deref(),
        &member_ids,
    )
    .await?;
    info!(group_id, created_by = principal.user_id(), "Created group");

    let group = fetch_group_for_member(&pool, group_id, principal.user_id())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(load_group(&pool, group).await?)))
}

#[utoipa::path(
    get,
    path = "/groups/{id}/",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group detail.", body = GroupResponse),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "No such group, or the caller is not a member."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn get_group(
    Path(group_id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<Json<GroupResponse>, ApiError> {
    let principal = require_auth(&headers, &pool, &auth).await?;
    let group = group_for_member(&pool, &group_id, principal.user_id()).await?;
    Ok(Json(load_group(&pool, group).await?))
}

#[utoipa::path(
    put,
    path = "/groups/{id}/",
    params(("id" = i64, Path, description = "Group id")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group replaced.", body = GroupResponse),
        (status = 400, description = "Field validation errors keyed by field name."),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "No such group, or the caller is not a member."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn replace_group(
    Path(group_id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Result<Json<GroupResponse>, ApiError> {
    apply_group_update(&group_id, &headers, &pool, &auth, &body, false).await
}

#[utoipa::path(
    patch,
    path = "/groups/{id}/",
    params(("id" = i64, Path, description = "Group id")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group updated.", body = GroupResponse),
        (status = 400, description = "Field validation errors keyed by field name."),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "No such group, or the caller is not a member."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn patch_group(
    Path(group_id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Result<Json<GroupResponse>, ApiError> {
    apply_group_update(&group_id, &headers, &pool, &auth, &body, true).await
}

async fn apply_group_update(
    raw_id: &str,
    headers: &HeaderMap,
    pool: &PgPool,
    auth: &AuthState,
    body: &Bytes,
    partial: bool,
) -> Result<Json<GroupResponse>, ApiError> {
    let principal = require_auth(headers, pool, auth).await?;
    let group = group_for_member(pool, raw_id, principal.user_id()).await?;
    let payload: UpdateGroupRequest = json_body(body)?;

    let (name, description) = merge_group(&group, payload, partial)?;
    store_group(pool, group.id, &name, description.as_deref()).await?;
    info!(group_id = group.id, "Updated group");

    let group = group_for_member(pool, raw_id, principal.user_id()).await?;
    Ok(Json(load_group(pool, group).await?))
}

/// Validate an update and fold it over the stored name and description.
fn merge_group(
    group: &storage::GroupRow,
    payload: UpdateGroupRequest,
    partial: bool,
) -> Result<(String, Option<String>), ApiError> {
    let mut errors = FieldErrors::new();

    let name = if partial && payload.name.is_none() {
        Some(group.name.clone())
    } else {
        required_text(&mut errors, "name", payload.name.as_ref())
    };
    if let Some(name) = &name {
        check_group_name(&mut errors, name);
    }

    let description = match payload.description {
        None => group.description.clone(),
        Some(description) => description.map(|text| text.trim().to_string()),
    };

    let Some(name) = name else {
        return Err(ApiError::Validation(errors));
    };
    errors.into_result()?;
    Ok((name, description))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 204, description = "Group deleted."),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "No such group, or the caller is not a member."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
/// Any member may delete the group.
pub async fn delete_group(
    Path(group_id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> Result<StatusCode, ApiError> {
    let principal = require_auth(&headers, &pool, &auth).await?;
    let group = group_for_member(&pool, &group_id, principal.user_id()).await?;
    remove_group(&pool, group.id).await?;
    info!(group_id = group.id, deleted_by = principal.user_id(), "Deleted group");
    Ok(StatusCode::NO_CONTENT)
}

/// Read `user_id` from an optional JSON object body.
fn body_user_id(body: &Bytes) -> Result<Option<Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ApiError::MalformedBody(err.to_string()))?;
    Ok(match value {
        Value::Object(mut fields) => fields.remove("user_id"),
        _ => None,
    })
}

#[utoipa::path(
    post,
    path = "/groups/{id}/add_member/",
    params(("id" = i64, Path, description = "Group id")),
    request_body = MemberRequest,
    responses(
        (status = 201, description = "User added.", body = MemberMessage),
        (status = 200, description = "User was already a member.", body = MemberMessage),
        (status = 400, description = "`user_id` missing or not an integer."),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "No such group or user."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
/// Idempotent: adding an existing member answers `200` and changes nothing.
pub async fn add_member(
    Path(group_id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<MemberMessage>), ApiError> {
    let principal = require_auth(&headers, &pool, &auth).await?;
    let group = group_for_member(&pool, &group_id, principal.user_id()).await?;

    let user_id = parse_user_id(body_user_id(&body)?.as_ref())?;
    let Some(user) = fetch_user_by_id(&pool, user_id).await? else {
        return Err(ApiError::MissingEntity("User not found"));
    };

    match storage::add_member(&pool, group.id, user.id).await? {
        Some(member) => {
            info!(group_id = group.id, user_id = user.id, "Added group member");
            Ok((
                StatusCode::CREATED,
                Json(added_message(&user.email, member)),
            ))
        }
        None => Ok((
            StatusCode::OK,
            Json(MemberMessage {
                message: format!("{} is already a member of this group", user.email),
                member: None,
            }),
        )),
    }
}

fn added_message(email: &str, member: GroupMemberResponse) -> MemberMessage {
    MemberMessage {
        message: format!("{email} added to group successfully"),
        member: Some(member),
    }
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/remove_member/",
    params(("id" = i64, Path, description = "Group id"), RemoveMemberQuery),
    request_body(content = MemberRequest, description = "Optional; `?user_id=` is used when absent"),
    responses(
        (status = 200, description = "User removed.", body = MemberMessage),
        (status = 400, description = "`user_id` missing, not an integer, or the group creator."),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "No such group or user, or the user is not a member."),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
/// Removes a member. The creator can never be removed.
pub async fn remove_member(
    Path(group_id): Path<String>,
    Query(query): Query<RemoveMemberQuery>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Result<Json<MemberMessage>, ApiError> {
    let principal = require_auth(&headers, &pool, &auth).await?;
    let group = group_for_member(&pool, &group_id, principal.user_id()).await?;

    let raw = body_user_id(&body)?
        .filter(|value| !is_falsy(value))
        .or(query.user_id.map(Value::String));
    let user_id = parse_user_id(raw.as_ref())?;

    if user_id == group.created_by {
        return Err(ApiError::BadRequest("Cannot remove group creator"));
    }

    let Some(user) = fetch_user_by_id(&pool, user_id).await? else {
        return Err(ApiError::MissingEntity("User not found"));
    };

    if !storage::remove_member(&pool, group.id, user.id).await? {
        return Err(ApiError::MissingEntity("User is not a member of this group"));
    }
    info!(group_id = group.id, user_id = user.id, "Removed group member");

    Ok(Json(MemberMessage {
        message: format!("{} removed from group successfully", user.email),
        member: None,
    }))
}

#[cfg(test)]
mod tests;
