use chrono::NaiveDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_jti: Uuid,
    pub refresh_jti: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub device_name: Option<String>,
    pub location: Option<String>,
    pub last_activity_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Short device label derived from a User-Agent header, e.g. "Mobile · Firefox".
pub fn device_name_from_user_agent(user_agent: &str) -> String {
    let ua = user_agent.to_lowercase();

    let kind = if ua.contains("ipad") || ua.contains("tablet") {
        "Tablet"
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
        "Mobile"
    } else {
        "Desktop"
    };

    // Order matters: Edge and Opera also advertise Chrome, Chrome advertises Safari.
    let browser = if ua.contains("edg/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("chrome") {
        "Chrome"
    } else if ua.contains("safari") {
        "Safari"
    } else {
        "Unknown browser"
    };

    format!("{kind} · {browser}")
}
