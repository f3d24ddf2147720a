pub mod password;
pub mod slug;
