use chrono::{DateTime, NaiveDateTime};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::store_role::StoreRole;

pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Signing secret plus retired secrets that may still have signed live tokens.
#[derive(Clone)]
pub struct JwtKeys {
    pub current: SecretString,
    pub previous: Vec<SecretString>,
}

impl JwtKeys {
    pub fn new(current: SecretString) -> Self {
        Self {
            current,
            previous: Vec::new(),
        }
    }
}

/// A freshly signed token with the identifiers callers need to persist.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: NaiveDateTime,
}

// ============================================================================
// Access Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreClaim {
    pub store_id: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub username: String,
    pub jti: String,
    pub stores: Vec<StoreClaim>,
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidToken)
    }

    pub fn token_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.jti).map_err(|_| AppError::InvalidToken)
    }
}

pub fn issue_access(
    user_id: Uuid,
    username: &str,
    store_roles: &[StoreRole],
    secret: &SecretString,
    ttl: Duration,
) -> AppResult<IssuedToken> {
    let (iat, exp) = window(ttl);
    let jti = Uuid::new_v4();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        username: username.to_string(),
        jti: jti.to_string(),
        stores: store_roles
            .iter()
            .map(|r| StoreClaim {
                store_id: r.store_id.to_string(),
                role: r.role.as_str().to_string(),
            })
            .collect(),
        permissions: store_roles.iter().map(StoreRole::permission).collect(),
        iat,
        exp,
    };
    Ok(IssuedToken {
        token: sign(&claims, secret)?,
        jti,
        expires_at: to_naive(exp),
    })
}

pub fn verify_access(token: &str, secret: &SecretString) -> AppResult<AccessClaims> {
    decode_with(token, secret, true).map_err(|_| AppError::InvalidToken)
}

// ============================================================================
// Refresh Tokens
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub username: String,
    pub jti: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_refresh(
    user_id: Uuid,
    username: &str,
    secret: &SecretString,
    ttl: Duration,
) -> AppResult<IssuedToken> {
    let (iat, exp) = window(ttl);
    let jti = Uuid::new_v4();
    let claims = RefreshClaims {
        sub: user_id.to_string(),
        username: username.to_string(),
        jti: jti.to_string(),
        token_type: REFRESH_TOKEN_TYPE.to_string(),
        iat,
        exp,
    };
    Ok(IssuedToken {
        token: sign(&claims, secret)?,
        jti,
        expires_at: to_naive(exp),
    })
}

pub fn verify_refresh(token: &str, secret: &SecretString) -> AppResult<RefreshClaims> {
    let claims: RefreshClaims = decode_with(token, secret, true).map_err(|_| AppError::InvalidToken)?;
    if claims.token_type != REFRESH_TOKEN_TYPE {
        return Err(AppError::InvalidToken);
    }
    Ok(claims)
}

#[derive(Deserialize)]
struct TokenTypePeek {
    #[serde(default)]
    token_type: Option<String>,
}

/// Whether a token claims to be a refresh token. The signature is not checked.
pub fn is_refresh_token(token: &str) -> bool {
    peek::<TokenTypePeek>(token)
        .ok()
        .and_then(|c| c.token_type)
        .is_some_and(|t| t == REFRESH_TOKEN_TYPE)
}

// ============================================================================
// Invitation Tokens
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationClaims {
    pub sub: String,
    pub invitation_id: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_invitation(
    invitation_id: Uuid,
    email: &str,
    secret: &SecretString,
    ttl: Duration,
) -> AppResult<String> {
    let (iat, exp) = window(ttl);
    let claims = InvitationClaims {
        sub: email.to_string(),
        invitation_id: invitation_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat,
        exp,
    };
    sign(&claims, secret)
}

/// Extract the invitation id from a signed invitation token.
pub fn verify_invitation(token: &str, secret: &SecretString) -> AppResult<Uuid> {
    let claims: InvitationClaims = decode_with(token, secret, true).map_err(|_| AppError::InvalidToken)?;
    Uuid::parse_str(&claims.invitation_id).map_err(|_| AppError::InvalidToken)
}

// ============================================================================
// Expiration-tolerant Inspection
// ============================================================================

#[derive(Deserialize)]
struct IdClaims {
    jti: String,
    exp: i64,
}

/// Token id and expiry recovered from a token that may already be expired.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenId {
    pub jti: Uuid,
    pub expires_at: NaiveDateTime,
}

/// Recover the `jti` of a token signed by us, even after it expired.
///
/// The current secret is tried first. An expired but correctly signed token is
/// accepted. Otherwise each previous secret is tried with expiry ignored. Returns
/// `None` when no secret validates the signature.
pub fn extract_token_id_even_if_expired(token: &str, keys: &JwtKeys) -> Option<TokenId> {
    let claims = match decode_with::<IdClaims>(token, &keys.current, true) {
        Ok(claims) => Some(claims),
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
            decode_with::<IdClaims>(token, &keys.current, false).ok()
        }
        Err(_) => None,
    };

    let claims = claims.or_else(|| {
        keys.previous
            .iter()
            .find_map(|secret| decode_with::<IdClaims>(token, secret, false).ok())
    })?;

    let jti = Uuid::parse_str(&claims.jti).ok()?;
    Some(TokenId {
        jti,
        expires_at: to_naive(claims.exp),
    })
}

#[derive(Deserialize)]
struct ExpPeek {
    exp: i64,
}

/// Reads `exp` without checking the signature. Unreadable tokens count as expired.
pub fn is_expired_ignoring_signature(token: &str) -> bool {
    match peek::<ExpPeek>(token) {
        Ok(claims) => claims.exp < OffsetDateTime::now_utc().unix_timestamp(),
        Err(_) => true,
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn window(ttl: Duration) -> (i64, i64) {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    (now, now + ttl.whole_seconds())
}

fn to_naive(timestamp: i64) -> NaiveDateTime {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

fn sign<T: Serialize>(claims: &T, secret: &SecretString) -> AppResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

fn decode_with<T: DeserializeOwned>(
    token: &str,
    secret: &SecretString,
    validate_exp: bool,
) -> Result<T, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = validate_exp;
    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

fn peek<T: DeserializeOwned>(token: &str) -> Result<T, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<T>(
        token,
        &DecodingKey::from_secret(b"ignored"), // Key is ignored when validation is disabled
        &validation,
    )
    .map(|data| data.claims)
}
