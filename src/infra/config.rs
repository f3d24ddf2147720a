use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use time::Duration;
use url::Url;

use super::InfraError;
use crate::application::jwt::JwtKeys;

pub struct AppConfig {
    pub jwt_secret: SecretString,
    /// Retired signing secrets, still accepted when recovering token ids.
    pub jwt_previous_secrets: Vec<SecretString>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub invitation_ttl_days: i64,
    pub email_verification_ttl_minutes: i64,
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    pub bind_addr: SocketAddr,
    pub redis_url: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    pub rate_limit_per_email: u64,
    pub database_url: String,
    /// Honour X-Forwarded-For / X-Real-IP. Only enable behind a reverse proxy.
    pub trust_proxy: bool,
    /// Store subdomains are `<name>.<root_domain>`.
    pub root_domain: String,
    pub resend_api_key: SecretString,
    pub email_from: String,
    pub default_trial_days: i64,
    pub token_cleanup_interval_secs: u64,
    pub subscription_job_interval_secs: u64,
    pub reminder_days_threshold: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let jwt_secret = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let jwt_previous_secrets = parse_secret_list(&get_env_default(
            "JWT_PREVIOUS_SECRETS",
            String::new(),
        ));

        let access_token_ttl_secs: i64 = get_env_default("ACCESS_TOKEN_TTL_SECS", 3_600);
        let refresh_token_ttl_days: i64 = get_env_default("REFRESH_TOKEN_TTL_DAYS", 7);
        let invitation_ttl_days: i64 = get_env_default("INVITATION_TTL_DAYS", 7);
        let email_verification_ttl_minutes: i64 =
            get_env_default("EMAIL_VERIFICATION_TTL_MINUTES", 1_440);

        let app_origin: Url = get_env("APP_ORIGIN");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|e: axum::http::header::InvalidHeaderValue| InfraError::ConfigInvalid {
                    var: "CORS_ORIGIN",
                    reason: e.to_string(),
                })?;

        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        );
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_per_ip: u64 = get_env_default("RATE_LIMIT_PER_IP", 120);
        let rate_limit_per_email: u64 = get_env_default("RATE_LIMIT_PER_EMAIL", 30);
        let database_url: String = get_env("DATABASE_URL");
        // Off unless explicitly enabled behind a trusted proxy.
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);
        let root_domain: String = get_env_default("ROOT_DOMAIN", "shopx.store".to_string());
        let resend_api_key = SecretString::new(get_env::<String>("RESEND_API_KEY").into());
        let email_from: String = get_env("EMAIL_FROM");
        let default_trial_days: i64 = get_env_default("DEFAULT_TRIAL_DAYS", 14);
        let token_cleanup_interval_secs: u64 =
            get_env_default("TOKEN_CLEANUP_INTERVAL_SECS", 86_400);
        let subscription_job_interval_secs: u64 =
            get_env_default("SUBSCRIPTION_JOB_INTERVAL_SECS", 3_600);
        let reminder_days_threshold: i64 = get_env_default("REMINDER_DAYS_THRESHOLD", 3);

        if subscription_job_interval_secs == 0 || token_cleanup_interval_secs == 0 {
            return Err(InfraError::ConfigInvalid {
                var: "SUBSCRIPTION_JOB_INTERVAL_SECS",
                reason: "job intervals must be positive".to_string(),
            });
        }

        Ok(Self {
            jwt_secret,
            jwt_previous_secrets,
            access_token_ttl: Duration::seconds(access_token_ttl_secs),
            refresh_token_ttl: Duration::days(refresh_token_ttl_days),
            invitation_ttl_days,
            email_verification_ttl_minutes,
            app_origin,
            cors_origin,
            bind_addr,
            redis_url,
            rate_limit_window_secs,
            rate_limit_per_ip,
            rate_limit_per_email,
            database_url,
            trust_proxy,
            root_domain,
            resend_api_key,
            email_from,
            default_trial_days,
            token_cleanup_interval_secs,
            subscription_job_interval_secs,
            reminder_days_threshold,
        })
    }

    pub fn jwt_keys(&self) -> JwtKeys {
        JwtKeys {
            current: self.jwt_secret.clone(),
            previous: self.jwt_previous_secrets.clone(),
        }
    }

    /// Front-end origin without a trailing slash, for building links.
    pub fn app_origin_str(&self) -> String {
        self.app_origin.as_str().trim_end_matches('/').to_string()
    }
}

fn parse_secret_list(raw: &str) -> Vec<SecretString> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| SecretString::new(s.into()))
        .collect()
}
