//! Shared setup for the Postgres-backed integration tests.
//!
//! Tests run against the database named by `REPARTO_TEST_DSN` and are skipped
//! when it is unset. Every test registers its own users with unique emails, so
//! tests can share one database.

#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    Router,
};
use reparto::api::{
    self,
    handlers::auth::{AuthConfig, AuthState},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use ulid::Ulid;

pub const PASSWORD: &str = "Sturdy-Lantern-42";

// Test binaries run tests in parallel; concurrent DDL on a fresh database can race.
static SCHEMA_APPLIED: OnceCell<()> = OnceCell::const_new();

pub struct TestApp {
    router: Router,
}

pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub access: String,
    pub refresh: String,
}

impl TestApp {
    /// Connect, apply the schema and build the router. `None` means skip.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(dsn) = std::env::var("REPARTO_TEST_DSN") else {
            eprintln!("Skipping integration test: REPARTO_TEST_DSN is not set");
            return Ok(None);
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&dsn)
            .await
            .context("failed to connect test pool")?;
        SCHEMA_APPLIED
            .get_or_try_init(|| api::schema::apply(&pool))
            .await?;

        let auth_state = Arc::new(AuthState::new(AuthConfig::new(SecretString::from(
            "integration-test-secret-0123456789abcdef",
        ))));
        let router = api::app(pool, auth_state, None)?;
        Ok(Some(Self { router }))
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body)?)
            .await
            .context("request failed")?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response is not JSON")?
        };
        Ok((status, value))
    }

    /// Register a fresh user and return its id and tokens.
    pub async fn register(&self, first_name: &str) -> Result<TestUser> {
        let email = unique_email(first_name);
        let (status, body) = self
            .call(
                Method::POST,
                "/users/register/",
                None,
                Some(json!({
                    "email": email,
                    "password": PASSWORD,
                    "password2": PASSWORD,
                    "first_name": first_name,
                })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} {body}");

        Ok(TestUser {
            id: body["user"]["id"].as_i64().context("user id")?,
            email,
            access: body["tokens"]["access"]
                .as_str()
                .context("access token")?
                .to_string(),
            refresh: body["tokens"]["refresh"]
                .as_str()
                .context("refresh token")?
                .to_string(),
        })
    }
}

pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Ulid::new()).to_lowercase()
}
