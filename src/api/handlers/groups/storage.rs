//! SQL for groups and their membership rows.
//!
//! Every lookup that takes a group id from the outside also takes the caller's
//! id and only matches groups the caller belongs to.

use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use tracing::Instrument;

use super::types::{GroupMemberResponse, GroupResponse};

/// A group row joined with its creator, before members are attached.
#[derive(Debug, Clone)]
pub(super) struct GroupRow {
    pub(super) id: i64,
    pub(super) name: String,
    pub(super) description: Option<String>,
    pub(super) created_by: i64,
    created_by_email: String,
    created_by_first_name: String,
    created_by_last_name: String,
    created_at: String,
    updated_at: String,
}

impl GroupRow {
    fn into_response(self, members: Vec<GroupMemberResponse>) -> GroupResponse {
        let created_by_name = display_name(
            &self.created_by_first_name,
            &self.created_by_last_name,
            &self.created_by_email,
        );
        GroupResponse {
            id: self.id,
            name: self.name,
            description: self.description,
            created_by: self.created_by,
            created_by_email: self.created_by_email,
            created_by_name,
            member_count: members.len(),
            members,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
impl GroupRow {
    pub(super) fn sample(id: i64, name: &str, description: Option<&str>, created_by: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_by,
            created_by_email: "owner@example.com".to_string(),
            created_by_first_name: String::new(),
            created_by_last_name: String::new(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }
}

/// `"first last"` when either name is set, otherwise the email.
pub(super) fn display_name(first_name: &str, last_name: &str, email: &str) -> String {
    if first_name.is_empty() && last_name.is_empty() {
        email.to_string()
    } else {
        format!("{first_name} {last_name}").trim().to_string()
    }
}

fn group_from_row(row: &PgRow) -> GroupRow {
    GroupRow {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_by: row.get("created_by"),
        created_by_email: row.get("created_by_email"),
        created_by_first_name: row.get("created_by_first_name"),
        created_by_last_name: row.get("created_by_last_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn member_from_row(row: &PgRow) -> GroupMemberResponse {
    GroupMemberResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        joined_at: row.get("joined_at"),
    }
}

/// Groups the user belongs to, newest first, with members attached.
pub(super) async fn fetch_groups_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<GroupResponse>, sqlx::Error> {
    let query = r#"
        SELECT g.id, g.name, g.description, g.created_by,
            u.email AS created_by_email,
            u.first_name AS created_by_first_name,
            u.last_name AS created_by_last_name,
            to_char(g.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(g.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        FROM groups g
        JOIN group_members gm ON gm.group_id = g.id AND gm.user_id = $1
        JOIN users u ON u.id = g.created_by
        ORDER BY g.created_at DESC, g.id DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    let groups: Vec<GroupRow> = rows.iter().map(group_from_row).collect();

    let ids: Vec<i64> = groups.iter().map(|group| group.id).collect();
    let mut members = fetch_members(pool, &ids).await?;

    Ok(groups
        .into_iter()
        .map(|group| {
            let group_members = members.remove(&group.id).unwrap_or_default();
            group.into_response(group_members)
        })
        .collect())
}

/// Members of the given groups, newest join first, keyed by group id.
async fn fetch_members(
    pool: &PgPool,
    group_ids: &[i64],
) -> Result<HashMap<i64, Vec<GroupMemberResponse>>, sqlx::Error> {
    let mut by_group: HashMap<i64, Vec<GroupMemberResponse>> = HashMap::new();
    if group_ids.is_empty() {
        return Ok(by_group);
    }

    let query = r#"
        SELECT gm.group_id, gm.id, gm.user_id, u.email, u.first_name, u.last_name,
            to_char(gm.joined_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS joined_at
        FROM group_members gm
        JOIN users u ON u.id = gm.user_id
        WHERE gm.group_id = ANY($1)
        ORDER BY gm.joined_at DESC, gm.id DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(group_ids)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    for row in &rows {
        let group_id: i64 = row.get("group_id");
        by_group
            .entry(group_id)
            .or_default()
            .push(member_from_row(row));
    }
    Ok(by_group)
}

/// Resolve a group by id, but only if `user_id` is one of its members.
pub(super) async fn fetch_group_for_member(
    pool: &PgPool,
    group_id: i64,
    user_id: i64,
) -> Result<Option<GroupRow>, sqlx::Error> {
    let query = r#"
        SELECT g.id, g.name, g.description, g.created_by,
            u.email AS created_by_email,
            u.first_name AS created_by_first_name,
            u.last_name AS created_by_last_name,
            to_char(g.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(g.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        FROM groups g
        JOIN group_members gm ON gm.group_id = g.id AND gm.user_id = $2
        JOIN users u ON u.id = g.created_by
        WHERE g.id = $1
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.as_ref().map(group_from_row))
}

/// Attach current members to a resolved group.
pub(super) async fn load_group(pool: &PgPool, group: GroupRow) -> Result<GroupResponse, sqlx::Error> {
    let mut members = fetch_members(pool, &[group.id]).await?;
    let group_members = members.remove(&group.id).unwrap_or_default();
    Ok(group.into_response(group_members))
}

/// Insert a group and its initial members in one transaction.
///
/// The creator is always enrolled. `member_ids` that name no user are skipped
/// and repeats collapse onto the unique `(group_id, user_id)` pair.
pub(super) async fn create_group(
    pool: &PgPool,
    created_by: i64,
    name: &str,
    description: Option<&str>,
    member_ids: &[i64],
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let query = "INSERT INTO groups (name, description, created_by) VALUES ($1, $2, $3) RETURNING id";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(description)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await?;
    let group_id: i64 = row.get("id");

    let query = r"
        INSERT INTO group_members (group_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (group_id, user_id) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(group_id)
        .bind(created_by)
        .execute(&mut *tx)
        .instrument(span)
        .await?;

    if !member_ids.is_empty() {
        let query = r"
            INSERT INTO group_members (group_id, user_id)
            SELECT $1, u.id FROM users u WHERE u.id = ANY($2)
            ON CONFLICT (group_id, user_id) DO NOTHING
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(group_id)
            .bind(member_ids)
            .execute(&mut *tx)
            .instrument(span)
            .await?;
    }

    tx.commit().await?;
    Ok(group_id)
}

pub(super) async fn update_group(
    pool: &PgPool,
    group_id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<(), sqlx::Error> {
    let query = r"
        UPDATE groups
        SET name = $2, description = $3, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(group_id)
        .bind(name)
        .bind(description)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

/// Delete a group; membership rows go with it.
pub(super) async fn delete_group(pool: &PgPool, group_id: i64) -> Result<(), sqlx::Error> {
    let query = "DELETE FROM groups WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(group_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

/// Enroll a user. Returns the new membership, or `None` if it already existed.
pub(super) async fn add_member(
    pool: &PgPool,
    group_id: i64,
    user_id: i64,
) -> Result<Option<GroupMemberResponse>, sqlx::Error> {
    let query = r#"
        WITH inserted AS (
            INSERT INTO group_members (group_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (group_id, user_id) DO NOTHING
            RETURNING id, user_id, joined_at
        )
        SELECT i.id, i.user_id, u.email, u.first_name, u.last_name,
            to_char(i.joined_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS joined_at
        FROM inserted i
        JOIN users u ON u.id = i.user_id
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.as_ref().map(member_from_row))
}

/// Drop a membership. Returns `false` when there was none.
pub(super) async fn remove_member(
    pool: &PgPool,
    group_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM group_members WHERE group_id = $1 AND user_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(group_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::display_name;

    #[test]
    fn display_name_prefers_names_over_email() {
        assert_eq!(display_name("Ada", "Lovelace", "ada@example.com"), "Ada Lovelace");
        assert_eq!(display_name("Ada", "", "ada@example.com"), "Ada");
        assert_eq!(display_name("", "Lovelace", "ada@example.com"), "Lovelace");
        assert_eq!(display_name("", "", "ada@example.com"), "ada@example.com");
    }
}
