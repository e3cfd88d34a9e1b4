//! Comment and like writes, each paired with its `posts` counter adjustment
//! in one transaction. Counter changes are relative `SET n = n ± 1` updates
//! so concurrent writers never lose an update.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::models::{CommentRow, LikeRow};
use crate::queries::{COMMENT_COLUMNS, comment_from_row, require_content};
use crate::{Database, Result, StoreError, new_id, now_timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeOutcome {
    Created(LikeRow),
    /// The (post, user) pair already had a like. Nothing was written.
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlikeOutcome {
    Deleted,
    NotFound,
}

impl Database {
    pub fn create_comment(&self, post_id: &str, owner_id: &str, content: &str) -> Result<CommentRow> {
        require_content(content, "comment content")?;

        let comment = CommentRow {
            id: new_id(),
            post_id: post_id.to_string(),
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            created_at: now_timestamp(),
        };

        self.with_tx(|tx| {
            require_visible_post(tx, post_id)?;
            tx.execute(
                "INSERT INTO comments (id, post_id, owner_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (&comment.id, &comment.post_id, &comment.owner_id, &comment.content, &comment.created_at),
            )?;
            adjust_comment_count(tx, post_id, 1)
        })?;

        debug!("Comment {} added to post {}", comment.id, post_id);
        Ok(comment)
    }

    /// Removes a comment and decrements its post's counter. A missing comment
    /// is `NotFound` and leaves every counter alone.
    pub fn delete_comment(&self, comment_id: &str) -> Result<CommentRow> {
        self.with_tx(|tx| {
            let removed = tx
                .query_row(
                    &format!("DELETE FROM comments WHERE id = ?1 RETURNING {COMMENT_COLUMNS}"),
                    [comment_id],
                    comment_from_row,
                )
                .optional()?
                .ok_or(StoreError::NotFound("comment"))?;

            adjust_comment_count(tx, &removed.post_id, -1)?;
            Ok(removed)
        })
    }

    /// Inserts a like unless the (post, user) pair already has one. The
    /// UNIQUE constraint decides: a conflicting insert changes zero rows and
    /// the counter is left as is.
    pub fn create_like(&self, post_id: &str, owner_id: &str) -> Result<LikeOutcome> {
        let like = LikeRow {
            id: new_id(),
            post_id: post_id.to_string(),
            owner_id: owner_id.to_string(),
            created_at: now_timestamp(),
        };

        self.with_tx(|tx| {
            require_visible_post(tx, post_id)?;
            let inserted = tx.execute(
                "INSERT INTO likes (id, post_id, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(post_id, owner_id) DO NOTHING",
                (&like.id, &like.post_id, &like.owner_id, &like.created_at),
            )?;

            if inserted == 0 {
                return Ok(LikeOutcome::AlreadyExists);
            }

            adjust_like_count(tx, post_id, 1)?;
            Ok(LikeOutcome::Created(like))
        })
    }

    pub fn delete_like(&self, post_id: &str, owner_id: &str) -> Result<UnlikeOutcome> {
        self.with_tx(|tx| {
            let removed = tx.execute(
                "DELETE FROM likes WHERE post_id = ?1 AND owner_id = ?2",
                [post_id, owner_id],
            )?;

            if removed == 0 {
                return Ok(UnlikeOutcome::NotFound);
            }

            adjust_like_count(tx, post_id, -1)?;
            Ok(UnlikeOutcome::Deleted)
        })
    }

    /// Recomputes both counters of every post from the comment and like rows
    /// and returns how many posts were out of step.
    pub fn reconcile_counters(&self) -> Result<usize> {
        self.with_tx(|tx| {
            let drifted = tx.execute(
                "UPDATE posts SET
                    post_comment_count = (SELECT COUNT(*) FROM comments c WHERE c.post_id = posts.id),
                    post_like_count = (SELECT COUNT(*) FROM likes l WHERE l.post_id = posts.id)
                 WHERE post_comment_count != (SELECT COUNT(*) FROM comments c WHERE c.post_id = posts.id)
                    OR post_like_count != (SELECT COUNT(*) FROM likes l WHERE l.post_id = posts.id)",
                [],
            )?;

            if drifted > 0 {
                warn!("Reconciled counters on {} posts", drifted);
            }
            Ok(drifted)
        })
    }
}

/// Archived posts, and posts of archived profiles, accept no new comments
/// or likes and are reported missing.
fn require_visible_post(conn: &Connection, post_id: &str) -> Result<()> {
    let archived: Option<bool> = conn
        .query_row(
            "SELECT p.post_is_archived OR u.profile_is_archived
             FROM posts p JOIN users u ON u.id = p.owner_id
             WHERE p.id = ?1",
            [post_id],
            |row| row.get(0),
        )
        .optional()?;

    match archived {
        Some(false) => Ok(()),
        _ => Err(StoreError::NotFound("post")),
    }
}

fn adjust_comment_count(conn: &Connection, post_id: &str, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE posts SET post_comment_count = MAX(post_comment_count + ?2, 0) WHERE id = ?1",
        (post_id, delta),
    )?;
    Ok(())
}

fn adjust_like_count(conn: &Connection, post_id: &str, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE posts SET post_like_count = MAX(post_like_count + ?2, 0) WHERE id = ?1",
        (post_id, delta),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRow;

    fn setup() -> (Database, String, String, PostRow) {
        let db = Database::open_in_memory().unwrap();
        let author = db.create_user("author", "author@example.com", "hash").unwrap();
        let reader = db.create_user("reader", "reader@example.com", "hash").unwrap();
        let post = db.create_post(&author.id, "first post").unwrap();
        (db, author.id, reader.id, post)
    }

    fn counts(db: &Database, post_id: &str) -> (i64, i64) {
        let post = db.get_post(post_id).unwrap().unwrap();
        (post.post_comment_count, post.post_like_count)
    }

    fn live_comments(db: &Database, post_id: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
                [post_id],
                |r| r.get(0),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn comment_counter_tracks_live_comments() {
        let (db, author, reader, post) = setup();

        let c1 = db.create_comment(&post.id, &reader, "nice").unwrap();
        let c2 = db.create_comment(&post.id, &author, "thanks").unwrap();
        db.create_comment(&post.id, &reader, "again").unwrap();
        assert_eq!(counts(&db, &post.id).0, 3);

        db.delete_comment(&c1.id).unwrap();
        db.delete_comment(&c2.id).unwrap();
        assert_eq!(counts(&db, &post.id).0, 1);
        assert_eq!(counts(&db, &post.id).0, live_comments(&db, &post.id));
    }

    #[test]
    fn deleting_missing_comment_leaves_counter() {
        let (db, _, reader, post) = setup();
        let c1 = db.create_comment(&post.id, &reader, "nice").unwrap();
        db.delete_comment(&c1.id).unwrap();

        assert!(matches!(
            db.delete_comment(&c1.id),
            Err(StoreError::NotFound("comment"))
        ));
        assert_eq!(counts(&db, &post.id).0, 0);
    }

    #[test]
    fn empty_comment_is_rejected_without_side_effects() {
        let (db, _, reader, post) = setup();
        assert!(matches!(
            db.create_comment(&post.id, &reader, "\n\t "),
            Err(StoreError::EmptyContent(_))
        ));
        assert_eq!(counts(&db, &post.id).0, 0);
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let (db, _, reader, _) = setup();
        assert!(matches!(
            db.create_comment("no-such-post", &reader, "hello"),
            Err(StoreError::NotFound("post"))
        ));
    }

    #[test]
    fn duplicate_like_does_not_increment() {
        let (db, _, reader, post) = setup();

        assert!(matches!(
            db.create_like(&post.id, &reader).unwrap(),
            LikeOutcome::Created(_)
        ));
        assert_eq!(db.create_like(&post.id, &reader).unwrap(), LikeOutcome::AlreadyExists);
        assert_eq!(counts(&db, &post.id).1, 1);
    }

    #[test]
    fn unlike_without_like_is_not_found() {
        let (db, author, reader, post) = setup();
        db.create_like(&post.id, &author).unwrap();

        assert_eq!(db.delete_like(&post.id, &reader).unwrap(), UnlikeOutcome::NotFound);
        assert_eq!(counts(&db, &post.id).1, 1);

        assert_eq!(db.delete_like(&post.id, &author).unwrap(), UnlikeOutcome::Deleted);
        assert_eq!(db.delete_like(&post.id, &author).unwrap(), UnlikeOutcome::NotFound);
        assert_eq!(counts(&db, &post.id).1, 0);
    }

    #[test]
    fn archived_post_rejects_reactions() {
        let (db, _, reader, post) = setup();
        db.set_post_archived(&post.id, true).unwrap();

        assert!(matches!(
            db.create_like(&post.id, &reader),
            Err(StoreError::NotFound("post"))
        ));
        assert!(matches!(
            db.create_comment(&post.id, &reader, "hi"),
            Err(StoreError::NotFound("post"))
        ));
        assert_eq!(counts(&db, &post.id), (0, 0));
    }

    #[test]
    fn archived_profile_posts_reject_reactions() {
        let (db, author, reader, post) = setup();
        db.create_like(&post.id, &reader).unwrap();
        db.set_profile_archived(&author, true).unwrap();

        assert!(matches!(
            db.create_comment(&post.id, &reader, "hi"),
            Err(StoreError::NotFound("post"))
        ));
        assert_eq!(counts(&db, &post.id), (0, 1));

        db.set_profile_archived(&author, false).unwrap();
        db.create_comment(&post.id, &reader, "back again").unwrap();
        assert_eq!(counts(&db, &post.id), (1, 1));
    }

    #[test]
    fn concurrent_likes_from_one_user_count_once() {
        let (db, _, reader, post) = setup();
        let db = std::sync::Arc::new(db);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let post_id = post.id.clone();
                let reader = reader.clone();
                std::thread::spawn(move || db.create_like(&post_id, &reader).unwrap())
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|outcome| matches!(outcome, LikeOutcome::Created(_)))
            .count();

        assert_eq!(created, 1);
        assert_eq!(counts(&db, &post.id).1, 1);
    }

    #[test]
    fn reconcile_repairs_drift() {
        let (db, _, reader, post) = setup();
        db.create_comment(&post.id, &reader, "one").unwrap();
        db.create_like(&post.id, &reader).unwrap();

        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE posts SET post_comment_count = 7, post_like_count = 0 WHERE id = ?1",
                [&post.id],
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.reconcile_counters().unwrap(), 1);
        assert_eq!(counts(&db, &post.id), (1, 1));
        assert_eq!(db.reconcile_counters().unwrap(), 0);
    }
}
