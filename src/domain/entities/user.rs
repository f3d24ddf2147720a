use chrono::NaiveDateTime;
use uuid::Uuid;

pub const LOCAL_PROVIDER: &str = "local";

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub provider: String,
    pub provider_id: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub email_verified: bool,
    pub profile_completed: bool,
    pub is_platform_admin: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl User {
    /// Name shown to other people: full name when known, otherwise the username.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => self.name.clone().unwrap_or_else(|| self.username.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            password_hash: String::new(),
            provider: LOCAL_PROVIDER.into(),
            provider_id: None,
            name: None,
            first_name: None,
            last_name: None,
            image_url: None,
            email_verified: false,
            profile_completed: false,
            is_platform_admin: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        let mut u = user();
        assert_eq!(u.display_name(), "jdoe");
        u.name = Some("John".into());
        assert_eq!(u.display_name(), "John");
        u.first_name = Some("Jane".into());
        u.last_name = Some("Doe".into());
        assert_eq!(u.display_name(), "Jane Doe");
    }
}
