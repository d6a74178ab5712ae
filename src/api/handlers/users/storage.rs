//! SQL for the `users` table.
//!
//! Timestamps are rendered by Postgres as RFC 3339 UTC strings so handlers
//! never deal with time zones.

use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;

use super::types::UserProfile;

/// Full user row as stored, including the password hash.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub date_joined: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRecord {
    /// Public view of the user; the password hash and active flag stay internal.
    #[must_use]
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            profile_picture: self.profile_picture.clone(),
            date_joined: self.date_joined.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// Values written by registration.
#[derive(Debug)]
pub(crate) struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone_number: Option<&'a str>,
}

/// Editable profile columns, written as a whole.
#[derive(Debug)]
pub(crate) struct ProfileFields {
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone_number: row.get("phone_number"),
        profile_picture: row.get("profile_picture"),
        is_active: row.get("is_active"),
        date_joined: row.get("date_joined"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) async fn fetch_user_by_id(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = r#"
        SELECT id, email, username, password_hash, first_name, last_name,
            phone_number, profile_picture, is_active,
            to_char(date_joined AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS date_joined,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        FROM users
        WHERE id = $1
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn fetch_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = r#"
        SELECT id, email, username, password_hash, first_name, last_name,
            phone_number, profile_picture, is_active,
            to_char(date_joined AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS date_joined,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        FROM users
        WHERE email = $1
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn email_taken(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1) AS taken";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(row.get("taken"))
}

/// Insert a user. A duplicate email surfaces as a unique violation.
pub(crate) async fn insert_user(pool: &PgPool, user: &NewUser<'_>) -> Result<UserRecord, sqlx::Error> {
    let query = r#"
        INSERT INTO users
            (email, username, password_hash, first_name, last_name, phone_number)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, email, username, password_hash, first_name, last_name,
            phone_number, profile_picture, is_active,
            to_char(date_joined AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS date_joined,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user.email)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.phone_number)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(user_from_row(&row))
}

pub(crate) async fn update_profile(
    pool: &PgPool,
    user_id: i64,
    fields: &ProfileFields,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = r#"
        UPDATE users
        SET username = $2,
            first_name = $3,
            last_name = $4,
            phone_number = $5,
            profile_picture = $6,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, email, username, password_hash, first_name, last_name,
            phone_number, profile_picture, is_active,
            to_char(date_joined AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS date_joined,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(fields.username.as_deref())
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.phone_number.as_deref())
        .bind(fields.profile_picture.as_deref())
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}
