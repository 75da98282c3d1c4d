use serde::Serialize;

#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: i64,
}

/// The shape of a user on the wire; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// A bearer session issued at login and revoked at logout.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: u64,
    pub expires_at: i64,
    pub created_at: i64,
}
