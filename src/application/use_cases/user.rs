use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::email_templates::email_verification_email;
use crate::application::helpers::password::{hash_password, verify_password};
use crate::application::jwt::{self, AccessClaims, IssuedToken, JwtKeys};
use crate::application::use_cases::{
    authorization::StoreRoleRepo,
    session::{ClientInfo, SessionUseCases},
    store::StoreRepo,
    token_revocation::TokenRevocationUseCases,
};
use crate::application::validators::{is_valid_email, is_valid_username, validate_password};
use crate::domain::entities::user::User;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, new_user: &NewUser) -> AppResult<User>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn update(&self, user: &User) -> AppResult<User>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn save_email_verification(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: NaiveDateTime,
    ) -> AppResult<()>;
    /// Deletes the token and returns its user when it has not expired.
    async fn consume_email_verification(
        &self,
        token_hash: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<Uuid>>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Email,
    Username,
}

impl LoginMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "email" => Some(LoginMode::Email),
            "username" => Some(LoginMode::Username),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_completed: bool,
    pub email_verified: bool,
}

/// Token and link settings for authentication.
#[derive(Clone)]
pub struct AuthSettings {
    pub keys: JwtKeys,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub email_verification_ttl_minutes: i64,
    pub app_origin: String,
}

#[derive(Clone)]
pub struct AuthUseCases {
    users: Arc<dyn UserRepo>,
    stores: Arc<dyn StoreRepo>,
    roles: Arc<dyn StoreRoleRepo>,
    sessions: SessionUseCases,
    revocation: TokenRevocationUseCases,
    email: Arc<dyn EmailSender>,
    settings: AuthSettings,
}

impl AuthUseCases {
    pub fn new(
        users: Arc<dyn UserRepo>,
        stores: Arc<dyn StoreRepo>,
        roles: Arc<dyn StoreRoleRepo>,
        sessions: SessionUseCases,
        revocation: TokenRevocationUseCases,
        email: Arc<dyn EmailSender>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            stores,
            roles,
            sessions,
            revocation,
            email,
            settings,
        }
    }

    // ========================================================================
    // Registration and login
    // ========================================================================

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> AppResult<User> {
        let username = username.trim();
        let email = email.trim().to_lowercase();

        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        if !is_valid_username(username) {
            return Err(AppError::InvalidInput(
                "Username must be 3-50 characters of letters, digits, '.', '_' or '-'".into(),
            ));
        }
        validate_password(password).map_err(AppError::InvalidInput)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict {
                field: "email",
                message: "Email is already registered".into(),
            });
        }
        if self.users.get_by_username(username).await?.is_some() {
            return Err(AppError::Conflict {
                field: "username",
                message: "Username is already taken".into(),
            });
        }

        let user = self
            .users
            .create(&NewUser {
                username: username.to_string(),
                email,
                password_hash: hash_password(password)?,
                first_name,
                last_name,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        // The account exists either way; the user can ask for a new link.
        if let Err(e) = self.send_verification(&user).await {
            warn!(user_id = %user.id, error = ?e, "Verification email failed");
        }
        Ok(user)
    }

    #[instrument(skip(self, password, client))]
    pub async fn login(
        &self,
        mode: LoginMode,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
    ) -> AppResult<LoginResult> {
        let identifier = identifier.trim();
        let user = match mode {
            LoginMode::Email => self.users.get_by_email(&identifier.to_lowercase()).await?,
            LoginMode::Username => self.users.get_by_username(identifier).await?,
        }
        .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AppError::InvalidCredentials);
        }

        let access = self.issue_access_for(&user).await?;
        let refresh = jwt::issue_refresh(
            user.id,
            &user.username,
            &self.settings.keys.current,
            self.settings.refresh_token_ttl,
        )?;
        let session = self
            .sessions
            .open(user.id, access.jti, refresh.jti, refresh.expires_at, client)
            .await?;

        info!(user_id = %user.id, session_id = %session.id, "User logged in");
        Ok(LoginResult {
            user,
            access,
            refresh,
            session_id: session.id,
        })
    }

    /// Issues a new access token for a valid, unrevoked refresh token.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<IssuedToken> {
        let claims = jwt::verify_refresh(refresh_token, &self.settings.keys.current)?;
        let refresh_jti = Uuid::parse_str(&claims.jti).map_err(|_| AppError::InvalidToken)?;
        if self.revocation.is_revoked(refresh_jti).await? {
            return Err(AppError::InvalidToken);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let access = self.issue_access_for(&user).await?;
        self.sessions.rotate_access(refresh_jti, access.jti).await?;
        Ok(access)
    }

    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> AppResult<()> {
        if let Some(token_id) =
            jwt::extract_token_id_even_if_expired(access_token, &self.settings.keys)
        {
            self.sessions.close_by_access_jti(token_id.jti).await?;
        }
        self.revocation
            .revoke_access_token(access_token, "logout")
            .await?;
        if let Some(refresh_token) = refresh_token {
            self.revocation
                .revoke_refresh_token(refresh_token, "logout")
                .await?;
        }
        Ok(())
    }

    /// Verifies an access token and rejects revoked ones.
    pub async fn authenticate(&self, access_token: &str) -> AppResult<AccessClaims> {
        let claims = jwt::verify_access(access_token, &self.settings.keys.current)?;
        if self.revocation.is_revoked(claims.token_id()?).await? {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }

    // ========================================================================
    // Profile
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn me(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn auth_status(&self, user_id: Uuid) -> AppResult<AuthStatus> {
        let user = self.me(user_id).await?;
        Ok(AuthStatus {
            authenticated: true,
            user_id: user.id,
            username: user.username,
            email: user.email,
            profile_completed: user.profile_completed,
            email_verified: user.email_verified,
        })
    }

    #[instrument(skip(self))]
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<User> {
        let mut user = self.me(user_id).await?;
        if update.name.is_some() {
            user.name = update.name;
        }
        if update.first_name.is_some() {
            user.first_name = update.first_name;
        }
        if update.last_name.is_some() {
            user.last_name = update.last_name;
        }
        if update.image_url.is_some() {
            user.image_url = update.image_url;
        }
        self.users.update(&user).await
    }

    /// Sets names, optionally changes the email, and marks the profile complete.
    #[instrument(skip(self))]
    pub async fn complete_profile(
        &self,
        user_id: Uuid,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
    ) -> AppResult<User> {
        let (first_name, last_name) = (first_name.trim(), last_name.trim());
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AppError::InvalidInput("First and last name are required".into()));
        }

        let mut user = self.me(user_id).await?;
        let mut email_changed = false;
        if let Some(email) = email.map(|e| e.trim().to_lowercase())
            && email != user.email
        {
            if !is_valid_email(&email) {
                return Err(AppError::InvalidInput("Invalid email address".into()));
            }
            if self.users.get_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict {
                    field: "email",
                    message: "Email is already registered".into(),
                });
            }
            user.email = email;
            user.email_verified = false;
            email_changed = true;
        }

        user.first_name = Some(first_name.to_string());
        user.last_name = Some(last_name.to_string());
        user.profile_completed = true;
        let user = self.users.update(&user).await?;

        if email_changed {
            self.send_verification(&user).await?;
        }
        Ok(user)
    }

    #[instrument(skip(self, current, new))]
    pub async fn change_password(&self, user_id: Uuid, current: &str, new: &str) -> AppResult<()> {
        let mut user = self.me(user_id).await?;
        if !verify_password(current, &user.password_hash) {
            return Err(AppError::InvalidCredentials);
        }
        validate_password(new).map_err(AppError::InvalidInput)?;
        user.password_hash = hash_password(new)?;
        self.users.update(&user).await?;
        info!(%user_id, "Password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: Uuid) -> AppResult<()> {
        self.me(user_id).await?;
        if self.stores.count_owned_by(user_id).await? > 0 {
            return Err(AppError::InvalidInput(
                "Transfer or delete your stores before deleting your account".into(),
            ));
        }
        self.sessions.delete_all_for_user(user_id).await?;
        self.users.delete(user_id).await?;
        info!(%user_id, "Account deleted");
        Ok(())
    }

    // ========================================================================
    // Email verification
    // ========================================================================

    #[instrument(skip(self, raw_token))]
    pub async fn verify_email(&self, raw_token: &str) -> AppResult<User> {
        let user_id = self
            .users
            .consume_email_verification(&hash_token(raw_token), Utc::now().naive_utc())
            .await?
            .ok_or(AppError::InvalidToken)?;
        let mut user = self.me(user_id).await?;
        user.email_verified = true;
        self.users.update(&user).await
    }

    #[instrument(skip(self))]
    pub async fn resend_verification(&self, user_id: Uuid) -> AppResult<()> {
        let user = self.me(user_id).await?;
        if user.email_verified {
            return Err(AppError::InvalidInput("Email is already verified".into()));
        }
        self.send_verification(&user).await
    }

    async fn send_verification(&self, user: &User) -> AppResult<()> {
        let raw = generate_token();
        let expires_at = Utc::now().naive_utc()
            + ChronoDuration::minutes(self.settings.email_verification_ttl_minutes);
        self.users
            .save_email_verification(&hash_token(&raw), user.id, expires_at)
            .await?;

        let link = format!("{}/verify-email?token={}", self.settings.app_origin, raw);
        let (subject, html) = email_verification_email(&self.settings.app_origin, &link);
        self.email.send(&user.email, &subject, &html).await
    }

    async fn issue_access_for(&self, user: &User) -> AppResult<IssuedToken> {
        let roles = self.roles.list_by_user(user.id).await?;
        jwt::issue_access(
            user.id,
            &user.username,
            &roles,
            &self.settings.keys.current,
            self.settings.access_token_ttl,
        )
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
