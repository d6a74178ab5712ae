//! Request/response types for the groups API.
//!
//! These payloads are shared between handlers and `OpenAPI` generation.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::handlers::deserialize_some;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = String)]
    pub name: Option<Option<String>>,
    pub description: Option<String>,
    /// Users to enroll next to the creator. Unknown ids are skipped.
    pub member_ids: Option<Vec<i64>>,
}

/// Group changes. `PUT` needs `name`; `PATCH` takes any subset.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateGroupRequest {
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

/// Body of the membership endpoints. `user_id` may be an integer or an integer string.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberRequest {
    #[schema(value_type = i64)]
    pub user_id: serde_json::Value,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RemoveMemberQuery {
    /// Used when the body carries no `user_id`.
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupMemberResponse {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_by_email: String,
    pub created_by_name: String,
    pub members: Vec<GroupMemberResponse>,
    pub member_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<GroupMemberResponse>,
}
