//! Row types that map directly to SQLite rows. Kept separate from the
//! agora-types API models so the DB layer has no serde surface.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub session_token: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<Vec<u8>>,
    pub profile_is_archived: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
    pub post_is_archived: bool,
    pub post_like_count: i64,
    pub post_comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeRow {
    pub id: String,
    pub post_id: String,
    pub owner_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct FeedRow {
    pub post: PostRow,
    pub owner_username: String,
    pub owner_profile_image: Option<Vec<u8>>,
}

/// Profile fields to change. `None` leaves a field alone, `Some(None)`
/// clears it.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub profile_image: Option<Option<Vec<u8>>>,
}

/// Row counts removed by a cascading delete.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeletedContent {
    pub posts: usize,
    pub comments: usize,
    pub likes: usize,
}
