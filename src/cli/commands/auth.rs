use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_ISSUER: &str = "jwt-issuer";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-seconds";

/// HS256 keys shorter than the hash output weaken the signature.
const JWT_SECRET_MIN_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub jwt_issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
}

impl Options {
    /// Parse token signing arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret is missing or too short, or a TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from)
            .context("missing required argument: --jwt-secret")?;

        if jwt_secret.expose_secret().len() < JWT_SECRET_MIN_LEN {
            bail!("--{ARG_JWT_SECRET} must be at least {JWT_SECRET_MIN_LEN} bytes");
        }

        let jwt_issuer = matches
            .get_one::<String>(ARG_JWT_ISSUER)
            .cloned()
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

        let access_token_ttl_seconds = positive(matches, ARG_ACCESS_TOKEN_TTL, 300)?;
        let refresh_token_ttl_seconds = positive(matches, ARG_REFRESH_TOKEN_TTL, 86_400)?;

        Ok(Self {
            jwt_secret,
            jwt_issuer,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        })
    }
}

fn positive(matches: &ArgMatches, id: &str, default: i64) -> Result<i64> {
    let value = matches.get_one::<i64>(id).copied().unwrap_or(default);
    if value <= 0 {
        bail!("--{id} must be greater than zero");
    }
    Ok(value)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign access and refresh tokens (HS256)")
                .env("REPARTO_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_ISSUER)
                .long(ARG_JWT_ISSUER)
                .help("Issuer (iss) written into and expected from tokens")
                .env("REPARTO_JWT_ISSUER")
                .default_value(env!("CARGO_PKG_NAME")),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token TTL in seconds")
                .env("REPARTO_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token TTL in seconds")
                .env("REPARTO_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
}
