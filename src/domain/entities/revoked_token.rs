use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "refresh" => TokenType::Refresh,
            _ => TokenType::Access,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RevokedToken {
    pub id: Uuid,
    pub token_id: Uuid,
    pub token_type: TokenType,
    pub expires_at: NaiveDateTime,
    pub revoked_at: NaiveDateTime,
    pub revoked_by: String,
}
