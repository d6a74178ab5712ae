use crate::api::{self, handlers::auth::AuthConfig, ServerOptions};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub cors_origin: Option<String>,
    pub apply_schema: bool,
    pub jwt_secret: SecretString,
    pub jwt_issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.jwt_secret)
        .with_issuer(args.jwt_issuer)
        .with_access_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_token_ttl_seconds);

    let options = ServerOptions {
        port: args.port,
        cors_origin: args.cors_origin,
        apply_schema: args.apply_schema,
    };

    api::new(options, args.dsn, auth_config).await
}
