use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Deliberately not `Serialize`: responses go through `PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,             // unique, lowercase
    pub email: String,                // unique, lowercase
    pub full_name: String,
    pub avatar: String,               // never empty
    pub cover_image: String,          // empty when unset
    pub password_hash: String,        // Argon2 PHC string
    pub refresh_token: Option<String>, // current refresh token, if logged in
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
}

/// Media URL column that can be replaced on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaField {
    Avatar,
    CoverImage,
}
