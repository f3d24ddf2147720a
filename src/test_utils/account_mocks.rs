//! In-memory mock implementations for account-related repository traits.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        session::SessionRepo,
        token_revocation::RevokedTokenRepo,
        user::{EmailSender, NewUser, UserRepo},
    },
    domain::entities::{
        revoked_token::{RevokedToken, TokenType},
        session::Session,
        user::{LOCAL_PROVIDER, User},
    },
    infra::{RateLimiterTrait, RateScope, rate_limit::bucket_key},
};

// ============================================================================
// InMemoryUserRepo
// ============================================================================

/// In-memory implementation of UserRepo for testing.
#[derive(Default)]
pub struct InMemoryUserRepo {
    pub users: Mutex<HashMap<Uuid, User>>,
    pub verifications: Mutex<HashMap<String, (Uuid, NaiveDateTime)>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let map: HashMap<Uuid, User> = users.into_iter().map(|u| (u.id, u)).collect();
        Self {
            users: Mutex::new(map),
            ..Default::default()
        }
    }

    pub fn get_all(&self) -> Vec<User> {
        self.users.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn create(&self, new_user: &NewUser) -> AppResult<User> {
        let now = chrono::Utc::now().naive_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            provider: LOCAL_PROVIDER.to_string(),
            provider_id: None,
            name: None,
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            image_url: None,
            email_verified: false,
            profile_completed: false,
            is_platform_admin: false,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&user.id) {
            return Err(AppError::NotFound);
        }
        let mut updated = user.clone();
        updated.updated_at = Some(chrono::Utc::now().naive_utc());
        users.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.users.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn save_email_verification(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: NaiveDateTime,
    ) -> AppResult<()> {
        self.verifications
            .lock()
            .unwrap()
            .insert(token_hash.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn consume_email_verification(
        &self,
        token_hash: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<Uuid>> {
        let entry = self.verifications.lock().unwrap().remove(token_hash);
        Ok(entry.and_then(|(user_id, expires_at)| (expires_at > now).then_some(user_id)))
    }
}

// ============================================================================
// InMemorySessionRepo
// ============================================================================

/// In-memory implementation of SessionRepo for testing.
#[derive(Default)]
pub struct InMemorySessionRepo {
    pub sessions: Mutex<HashMap<Uuid, Session>>,
}

impl InMemorySessionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        let map: HashMap<Uuid, Session> = sessions.into_iter().map(|s| (s.id, s)).collect();
        Self {
            sessions: Mutex::new(map),
        }
    }

    pub fn get_all(&self) -> Vec<Session> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl SessionRepo for InMemorySessionRepo {
    async fn create(&self, session: &Session) -> AppResult<Session> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_access_jti(&self, jti: Uuid) -> AppResult<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.access_jti == jti)
            .cloned())
    }

    async fn get_by_refresh_jti(&self, jti: Uuid) -> AppResult<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.refresh_jti == jti)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(sessions)
    }

    async fn touch(&self, id: Uuid, at: NaiveDateTime) -> AppResult<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&id) {
            session.last_activity_at = at;
        }
        Ok(())
    }

    async fn update_access_jti(&self, id: Uuid, access_jti: Uuid, at: NaiveDateTime) -> AppResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&id).ok_or(AppError::NotFound)?;
        session.access_jti = access_jti;
        session.last_activity_at = at;
        session.updated_at = Some(at);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.sessions.lock().unwrap().remove(&id);
        Ok(())
    }
}

// ============================================================================
// InMemoryRevokedTokenRepo
// ============================================================================

/// In-memory implementation of RevokedTokenRepo for testing.
#[derive(Default)]
pub struct InMemoryRevokedTokenRepo {
    pub tokens: Mutex<HashMap<Uuid, RevokedToken>>,
}

impl InMemoryRevokedTokenRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_all(&self) -> Vec<RevokedToken> {
        self.tokens.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl RevokedTokenRepo for InMemoryRevokedTokenRepo {
    async fn insert(
        &self,
        token_id: Uuid,
        token_type: TokenType,
        expires_at: NaiveDateTime,
        revoked_by: &str,
    ) -> AppResult<bool> {
        let mut tokens = self.tokens.lock().unwrap();
        if tokens.contains_key(&token_id) {
            return Ok(false);
        }
        tokens.insert(
            token_id,
            RevokedToken {
                id: Uuid::new_v4(),
                token_id,
                token_type,
                expires_at,
                revoked_at: chrono::Utc::now().naive_utc(),
                revoked_by: revoked_by.to_string(),
            },
        );
        Ok(true)
    }

    async fn exists(&self, token_id: Uuid) -> AppResult<bool> {
        Ok(self.tokens.lock().unwrap().contains_key(&token_id))
    }

    async fn delete_expired(&self, now: NaiveDateTime) -> AppResult<u64> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}

// ============================================================================
// InMemoryEmailSender
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Email sender that records every message instead of delivering it.
#[derive(Default)]
pub struct InMemoryEmailSender {
    pub emails: Mutex<Vec<SentEmail>>,
    pub failing: Mutex<bool>,
}

impl InMemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `send` fails like an unreachable provider and records nothing.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.emails.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::Internal("email provider unavailable".into()));
        }
        self.emails.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// InMemoryRateLimiter
// ============================================================================

/// Counting rate limiter that never touches Redis.
pub struct InMemoryRateLimiter {
    pub counts: Mutex<HashMap<String, u64>>,
    pub max_per_ip: u64,
    pub max_per_email: u64,
}

impl InMemoryRateLimiter {
    pub fn new(max_per_ip: u64, max_per_email: u64) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            max_per_ip,
            max_per_email,
        }
    }

    /// Never rejects a request.
    pub fn permissive() -> Self {
        Self::new(u64::MAX, u64::MAX)
    }

    fn bump(&self, key: String, limit: u64) -> AppResult<()> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        if *count > limit {
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, scope: RateScope, ip: &str, email: Option<&str>) -> AppResult<()> {
        self.bump(bucket_key(scope, "ip", ip), self.max_per_ip)?;
        if let (RateScope::Api, Some(email)) = (scope, email) {
            self.bump(bucket_key(scope, "email", email), self.max_per_email)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_rejects_after_budget() {
        let limiter = InMemoryRateLimiter::new(2, 10);
        let api = RateScope::Api;
        assert!(limiter.check(api, "10.0.0.1", None).await.is_ok());
        assert!(limiter.check(api, "10.0.0.1", None).await.is_ok());
        assert!(matches!(
            limiter.check(api, "10.0.0.1", None).await,
            Err(AppError::RateLimited)
        ));
        assert!(limiter.check(api, "10.0.0.2", None).await.is_ok());
        // Storefront traffic has its own budget.
        assert!(limiter.check(RateScope::Storefront, "10.0.0.1", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_email_budget_is_case_insensitive() {
        let limiter = InMemoryRateLimiter::new(100, 1);
        let api = RateScope::Api;
        assert!(limiter.check(api, "a", Some("Owner@Example.com")).await.is_ok());
        assert!(limiter.check(api, "b", Some("owner@example.com")).await.is_err());
    }
}
