use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StoreVisitor {
    pub id: Uuid,
    pub store_id: Uuid,
    pub visitor_key: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub discovery_source: Option<String>,
    pub newsletter: bool,
    pub source: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub last_page_visited: Option<String>,
    pub total_visits: i32,
    pub total_page_views: i32,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct VisitorStats {
    pub total_visitors: i64,
    pub recent_visitors: i64,
    pub newsletter_subscribers: i64,
}
