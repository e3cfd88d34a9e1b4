//! Row -> API model conversion.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use agora_db::models::{CommentRow, DeletedContent, FeedRow, LikeRow, PostRow, UserRow};
use agora_types::api::DeleteSummary;
use agora_types::models::{Comment, FeedItem, Like, Post, Profile, PublicProfile};

fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}': {}", raw, e);
        DateTime::default()
    })
}

fn encode_image(image: Option<&[u8]>) -> Option<String> {
    image.map(|bytes| B64.encode(bytes))
}

pub fn profile(row: &UserRow) -> Profile {
    Profile {
        id: parse_id(&row.id, "user"),
        username: row.username.clone(),
        email: row.email.clone(),
        display_name: row.display_name.clone(),
        bio: row.bio.clone(),
        profile_image: encode_image(row.profile_image.as_deref()),
        profile_is_archived: row.profile_is_archived,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn public_profile(row: &UserRow) -> PublicProfile {
    PublicProfile {
        id: parse_id(&row.id, "user"),
        username: row.username.clone(),
        display_name: row.display_name.clone(),
        bio: row.bio.clone(),
        profile_image: encode_image(row.profile_image.as_deref()),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn post(row: PostRow) -> Post {
    Post {
        id: parse_id(&row.id, "post"),
        owner_id: parse_id(&row.owner_id, "user"),
        created_at: parse_timestamp(&row.created_at),
        content: row.content,
        post_is_archived: row.post_is_archived,
        post_like_count: row.post_like_count,
        post_comment_count: row.post_comment_count,
    }
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: parse_id(&row.id, "comment"),
        post_id: parse_id(&row.post_id, "post"),
        owner_id: parse_id(&row.owner_id, "user"),
        created_at: parse_timestamp(&row.created_at),
        content: row.content,
    }
}

pub fn like(row: LikeRow) -> Like {
    Like {
        id: parse_id(&row.id, "like"),
        post_id: parse_id(&row.post_id, "post"),
        owner_id: parse_id(&row.owner_id, "user"),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn feed_item(row: FeedRow) -> FeedItem {
    FeedItem {
        owner_profile_image: encode_image(row.owner_profile_image.as_deref()),
        owner_username: row.owner_username,
        post: post(row.post),
    }
}

pub fn delete_summary(deleted: DeletedContent) -> DeleteSummary {
    DeleteSummary {
        posts: deleted.posts,
        comments: deleted.comments,
        likes: deleted.likes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_timestamps_keep_microseconds() {
        let parsed = parse_timestamp("2026-03-01T12:30:00.000001Z");
        assert_eq!(parsed.timestamp_subsec_micros(), 1);
        assert_eq!(parse_timestamp("2026-03-01 12:30:00"), DateTime::<Utc>::default());
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        assert_eq!(parse_id("not-a-uuid", "post"), Uuid::default());
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
