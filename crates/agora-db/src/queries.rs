use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::unique_violation;
use crate::models::{CommentRow, LikeRow, PostRow, ProfileUpdate, UserRow};
use crate::{Database, Result, StoreError, new_id, now_timestamp};

pub(crate) const USER_COLUMNS: &str = "id, username, email, password, session_token, display_name, \
     bio, profile_image, profile_is_archived, created_at";
pub(crate) const POST_COLUMNS: &str = "id, owner_id, content, created_at, post_is_archived, \
     post_like_count, post_comment_count";
pub(crate) const COMMENT_COLUMNS: &str = "id, post_id, owner_id, content, created_at";
pub(crate) const LIKE_COLUMNS: &str = "id, post_id, owner_id, created_at";

impl Database {
    // -- Users --

    /// Inserts a user. The email is stored lower-cased. Duplicate usernames
    /// or emails surface as [`StoreError::Conflict`].
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<UserRow> {
        let user = UserRow {
            id: new_id(),
            username: username.to_string(),
            email: email.to_lowercase(),
            password: password_hash.to_string(),
            session_token: None,
            display_name: None,
            bio: None,
            profile_image: None,
            profile_is_archived: false,
            created_at: now_timestamp(),
        };

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (&user.id, &user.username, &user.email, &user.password, &user.created_at),
            )
            .map_err(|e| match unique_violation(&e) {
                Some(msg) if msg.contains("users.email") => StoreError::Conflict("email"),
                Some(_) => StoreError::Conflict("username"),
                None => e.into(),
            })?;
            Ok(())
        })?;

        Ok(user)
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    /// Replaces the user's session token, invalidating the previous one.
    pub fn set_session_token(&self, user_id: &str, token: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET session_token = ?2 WHERE id = ?1",
                (user_id, token),
            )?;
            require_changed(changed, "user")
        })
    }

    pub fn clear_session_token(&self, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET session_token = NULL WHERE id = ?1",
                [user_id],
            )?;
            require_changed(changed, "user")
        })
    }

    pub fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<UserRow> {
        self.with_tx(|tx| {
            if query_user(tx, "id", user_id)?.is_none() {
                return Err(StoreError::NotFound("user"));
            }
            if let Some(display_name) = &update.display_name {
                tx.execute(
                    "UPDATE users SET display_name = ?2 WHERE id = ?1",
                    (user_id, display_name),
                )?;
            }
            if let Some(bio) = &update.bio {
                tx.execute("UPDATE users SET bio = ?2 WHERE id = ?1", (user_id, bio))?;
            }
            if let Some(image) = &update.profile_image {
                tx.execute(
                    "UPDATE users SET profile_image = ?2 WHERE id = ?1",
                    (user_id, image),
                )?;
            }
            query_user(tx, "id", user_id)?.ok_or(StoreError::NotFound("user"))
        })
    }

    pub fn set_profile_archived(&self, user_id: &str, archived: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET profile_is_archived = ?2 WHERE id = ?1",
                (user_id, archived),
            )?;
            require_changed(changed, "user")
        })
    }

    // -- Posts --

    pub fn create_post(&self, owner_id: &str, content: &str) -> Result<PostRow> {
        require_content(content, "post content")?;

        let post = PostRow {
            id: new_id(),
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            created_at: now_timestamp(),
            post_is_archived: false,
            post_like_count: 0,
            post_comment_count: 0,
        };

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, owner_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&post.id, &post.owner_id, &post.content, &post.created_at),
            )?;
            Ok(())
        })?;

        Ok(post)
    }

    pub fn get_post(&self, post_id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, post_id))
    }

    pub fn update_post_content(&self, post_id: &str, content: &str) -> Result<PostRow> {
        require_content(content, "post content")?;

        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE posts SET content = ?2 WHERE id = ?1",
                (post_id, content),
            )?;
            require_changed(changed, "post")?;
            query_post(tx, post_id)?.ok_or(StoreError::NotFound("post"))
        })
    }

    /// Archiving only flips visibility. Counters and children are untouched.
    pub fn set_post_archived(&self, post_id: &str, archived: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET post_is_archived = ?2 WHERE id = ?1",
                (post_id, archived),
            )?;
            require_changed(changed, "post")
        })
    }

    // -- Comments & likes (single-record reads) --

    pub fn get_comment(&self, comment_id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                    [comment_id],
                    comment_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_like(&self, post_id: &str, owner_id: &str) -> Result<Option<LikeRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {LIKE_COLUMNS} FROM likes WHERE post_id = ?1 AND owner_id = ?2"),
                    [post_id, owner_id],
                    like_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }
}

pub(crate) fn require_content(content: &str, what: &'static str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(StoreError::EmptyContent(what));
    }
    Ok(())
}

fn require_changed(changed: usize, what: &'static str) -> Result<()> {
    if changed == 0 {
        return Err(StoreError::NotFound(what));
    }
    Ok(())
}

/// `column` is always a literal from this module, never caller input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
            [value],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn query_post(conn: &Connection, post_id: &str) -> Result<Option<PostRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            [post_id],
            post_from_row,
        )
        .optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        session_token: row.get(4)?,
        display_name: row.get(5)?,
        bio: row.get(6)?,
        profile_image: row.get(7)?,
        profile_is_archived: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Maps [`POST_COLUMNS`] starting at column `0`.
pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        post_is_archived: row.get(4)?,
        post_like_count: row.get(5)?,
        post_comment_count: row.get(6)?,
    })
}

pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        owner_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn like_from_row(row: &Row<'_>) -> rusqlite::Result<LikeRow> {
    Ok(LikeRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn duplicate_username_and_email_conflict() {
        let db = db();
        db.create_user("alice", "alice@example.com", "hash").unwrap();

        let err = db.create_user("alice", "other@example.com", "hash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict("username")));

        let err = db.create_user("alice2", "ALICE@example.com", "hash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict("email")));
    }

    #[test]
    fn session_token_roundtrip() {
        let db = db();
        let user = db.create_user("bob", "bob@example.com", "hash").unwrap();

        db.set_session_token(&user.id, "tok-1").unwrap();
        let stored = db.get_user_by_id(&user.id).unwrap().unwrap();
        assert_eq!(stored.session_token.as_deref(), Some("tok-1"));

        db.clear_session_token(&user.id).unwrap();
        let stored = db.get_user_by_username("bob").unwrap().unwrap();
        assert!(stored.session_token.is_none());

        assert!(matches!(
            db.set_session_token("missing", "tok"),
            Err(StoreError::NotFound("user"))
        ));
    }

    #[test]
    fn profile_update_sets_and_clears_fields() {
        let db = db();
        let user = db.create_user("carol", "carol@example.com", "hash").unwrap();

        let updated = db
            .update_profile(
                &user.id,
                &ProfileUpdate {
                    display_name: Some(Some("Carol".into())),
                    bio: Some(Some("hi".into())),
                    profile_image: Some(Some(vec![1, 2, 3])),
                },
            )
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Carol"));
        assert_eq!(updated.profile_image, Some(vec![1, 2, 3]));

        let updated = db
            .update_profile(
                &user.id,
                &ProfileUpdate {
                    bio: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.bio.is_none());
        assert_eq!(updated.display_name.as_deref(), Some("Carol"));
    }

    #[test]
    fn empty_post_content_is_rejected() {
        let db = db();
        let user = db.create_user("dave", "dave@example.com", "hash").unwrap();

        assert!(matches!(
            db.create_post(&user.id, "   "),
            Err(StoreError::EmptyContent(_))
        ));

        let post = db.create_post(&user.id, "hello").unwrap();
        assert!(matches!(
            db.update_post_content(&post.id, ""),
            Err(StoreError::EmptyContent(_))
        ));
    }

    #[test]
    fn archive_flag_persists() {
        let db = db();
        let user = db.create_user("erin", "erin@example.com", "hash").unwrap();
        let post = db.create_post(&user.id, "hello").unwrap();

        db.set_post_archived(&post.id, true).unwrap();
        assert!(db.get_post(&post.id).unwrap().unwrap().post_is_archived);

        db.set_post_archived(&post.id, false).unwrap();
        assert!(!db.get_post(&post.id).unwrap().unwrap().post_is_archived);

        db.set_profile_archived(&user.id, true).unwrap();
        assert!(db.get_user_by_id(&user.id).unwrap().unwrap().profile_is_archived);
    }
}
