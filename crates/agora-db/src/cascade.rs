use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::models::DeletedContent;
use crate::{Database, Result, StoreError};

impl Database {
    /// Deletes a post together with every comment and like attached to it.
    /// Children go first; the parent's counters need no adjustment since the
    /// parent itself is removed.
    pub fn delete_post(&self, post_id: &str) -> Result<DeletedContent> {
        let deleted = self.with_tx(|tx| {
            let comments = tx.execute("DELETE FROM comments WHERE post_id = ?1", [post_id])?;
            let likes = tx.execute("DELETE FROM likes WHERE post_id = ?1", [post_id])?;
            let posts = tx.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;

            if posts == 0 {
                return Err(StoreError::NotFound("post"));
            }
            Ok(DeletedContent { posts, comments, likes })
        })?;

        info!(
            "Deleted post {} ({} comments, {} likes)",
            post_id, deleted.comments, deleted.likes
        );
        Ok(deleted)
    }

    /// Removes everything an archived user owns: their posts, every comment
    /// and like on those posts regardless of author, and their comments and
    /// likes on other users' posts (whose counters are decremented). The user
    /// row itself stays.
    pub fn delete_user_content(&self, user_id: &str) -> Result<DeletedContent> {
        let deleted = self.with_tx(|tx| delete_content_of(tx, user_id))?;
        info!(
            "Deleted content of user {}: {} posts, {} comments, {} likes",
            user_id, deleted.posts, deleted.comments, deleted.likes
        );
        Ok(deleted)
    }

    /// [`Database::delete_user_content`] followed by removal of the user row,
    /// all in one transaction.
    pub fn delete_user(&self, user_id: &str) -> Result<DeletedContent> {
        let deleted = self.with_tx(|tx| {
            let deleted = delete_content_of(tx, user_id)?;
            tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
            Ok(deleted)
        })?;
        info!("Deleted user {}", user_id);
        Ok(deleted)
    }
}

fn delete_content_of(conn: &Connection, user_id: &str) -> Result<DeletedContent> {
    let archived: Option<bool> = conn
        .query_row(
            "SELECT profile_is_archived FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;

    match archived {
        None => return Err(StoreError::NotFound("user")),
        Some(false) => return Err(StoreError::NotArchived),
        Some(true) => {}
    }

    // Posts owned by the user are deleted below, so only other users' posts
    // need their counters brought down.
    conn.execute(
        "UPDATE posts SET post_comment_count = MAX(post_comment_count -
            (SELECT COUNT(*) FROM comments c WHERE c.post_id = posts.id AND c.owner_id = ?1), 0)
         WHERE owner_id != ?1
           AND id IN (SELECT post_id FROM comments WHERE owner_id = ?1)",
        [user_id],
    )?;
    conn.execute(
        "UPDATE posts SET post_like_count = MAX(post_like_count -
            (SELECT COUNT(*) FROM likes l WHERE l.post_id = posts.id AND l.owner_id = ?1), 0)
         WHERE owner_id != ?1
           AND id IN (SELECT post_id FROM likes WHERE owner_id = ?1)",
        [user_id],
    )?;

    let comments = conn.execute(
        "DELETE FROM comments
         WHERE owner_id = ?1
            OR post_id IN (SELECT id FROM posts WHERE owner_id = ?1)",
        [user_id],
    )?;
    let likes = conn.execute(
        "DELETE FROM likes
         WHERE owner_id = ?1
            OR post_id IN (SELECT id FROM posts WHERE owner_id = ?1)",
        [user_id],
    )?;
    let posts = conn.execute("DELETE FROM posts WHERE owner_id = ?1", [user_id])?;

    Ok(DeletedContent { posts, comments, likes })
}
