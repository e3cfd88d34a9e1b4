//! Fixed-size, offset-based paging. Every listing takes a validated [`Page`],
//! so a bad page number is rejected before any connection is touched.

use std::fmt;
use std::str::FromStr;

use rusqlite::{Connection, Params, Row};

use crate::models::{CommentRow, FeedRow, LikeRow, PostRow};
use crate::queries::{COMMENT_COLUMNS, LIKE_COLUMNS, comment_from_row, like_from_row, post_from_row};
use crate::{Database, Result, StoreError};

pub const PAGE_SIZE: usize = 5;

/// A 1-indexed page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Page(u32);

impl Page {
    pub const FIRST: Page = Page(1);

    pub fn new(n: i64) -> Result<Self> {
        if n < 1 {
            return Err(StoreError::InvalidPage(n.to_string()));
        }
        u32::try_from(n)
            .map(Page)
            .map_err(|_| StoreError::InvalidPage(n.to_string()))
    }

    pub fn number(self) -> u32 {
        self.0
    }

    fn offset(self) -> i64 {
        (i64::from(self.0) - 1) * PAGE_SIZE as i64
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::FIRST
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accepts only plain decimal integers: `"1.5"`, `"0"`, `"-2"` and `"x"`
/// are all [`StoreError::InvalidPage`].
impl FromStr for Page {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let n: i64 = trimmed
            .parse()
            .map_err(|_| StoreError::InvalidPage(trimmed.to_string()))?;
        Page::new(n)
    }
}

impl Database {
    /// A user's posts in insertion order. Archived posts are left out unless
    /// `include_archived` is set (the owner viewing their own posts).
    pub fn user_posts_page(&self, owner_id: &str, include_archived: bool, page: Page) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            paginate(
                conn,
                "SELECT id, owner_id, content, created_at, post_is_archived, post_like_count, post_comment_count
                 FROM posts
                 WHERE owner_id = ?1 AND (?2 OR post_is_archived = 0)
                 ORDER BY rowid",
                (owner_id, include_archived),
                page,
                post_from_row,
            )
        })
    }

    pub fn post_comments_page(&self, post_id: &str, page: Page) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            paginate(
                conn,
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1 ORDER BY rowid"),
                [post_id],
                page,
                comment_from_row,
            )
        })
    }

    pub fn user_comments_page(&self, owner_id: &str, page: Page) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            paginate(
                conn,
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE owner_id = ?1 ORDER BY rowid"),
                [owner_id],
                page,
                comment_from_row,
            )
        })
    }

    pub fn post_likes_page(&self, post_id: &str, page: Page) -> Result<Vec<LikeRow>> {
        self.with_conn(|conn| {
            paginate(
                conn,
                &format!("SELECT {LIKE_COLUMNS} FROM likes WHERE post_id = ?1 ORDER BY rowid"),
                [post_id],
                page,
                like_from_row,
            )
        })
    }

    /// Global feed, newest first. Archived posts and posts of archived
    /// profiles are excluded. Each row carries the owner's username and image.
    pub fn feed_page(&self, page: Page) -> Result<Vec<FeedRow>> {
        self.with_conn(|conn| {
            paginate(
                conn,
                "SELECT p.id, p.owner_id, p.content, p.created_at, p.post_is_archived,
                        p.post_like_count, p.post_comment_count, u.username, u.profile_image
                 FROM posts p
                 JOIN users u ON u.id = p.owner_id
                 WHERE p.post_is_archived = 0 AND u.profile_is_archived = 0
                 ORDER BY p.created_at DESC, p.rowid DESC",
                (),
                page,
                |row| {
                    Ok(FeedRow {
                        post: post_from_row(row)?,
                        owner_username: row.get(7)?,
                        owner_profile_image: row.get(8)?,
                    })
                },
            )
        })
    }
}

/// Appends `LIMIT`/`OFFSET` for `page` to `sql` and collects the rows.
fn paginate<P, T, F>(conn: &Connection, sql: &str, params: P, page: Page, map: F) -> Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let sql = format!("{sql} LIMIT {PAGE_SIZE} OFFSET {}", page.offset());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize) -> (Database, String, Vec<PostRow>) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("pager", "pager@example.com", "hash").unwrap();
        let posts = (1..=n)
            .map(|i| db.create_post(&user.id, &format!("post {i}")).unwrap())
            .collect();
        (db, user.id, posts)
    }

    fn contents(rows: &[PostRow]) -> Vec<String> {
        rows.iter().map(|p| p.content.clone()).collect()
    }

    #[test]
    fn page_parsing() {
        assert_eq!("1".parse::<Page>().unwrap(), Page::FIRST);
        assert_eq!(" 3 ".parse::<Page>().unwrap().number(), 3);
        for bad in ["0", "-1", "1.5", "", "two", "99999999999"] {
            assert!(
                matches!(bad.parse::<Page>(), Err(StoreError::InvalidPage(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(Page::new(0), Err(StoreError::InvalidPage(_))));
    }

    #[test]
    fn twelve_items_over_four_pages() {
        let (db, user, _) = seeded(12);

        let page = |n| db.user_posts_page(&user, false, Page::new(n).unwrap()).unwrap();

        assert_eq!(
            contents(&page(1)),
            ["post 1", "post 2", "post 3", "post 4", "post 5"]
        );
        assert_eq!(contents(&page(3)), ["post 11", "post 12"]);
        assert!(page(4).is_empty());
    }

    #[test]
    fn repeated_calls_are_stable() {
        let (db, user, _) = seeded(7);
        let a = db.user_posts_page(&user, false, Page::new(2).unwrap()).unwrap();
        let b = db.user_posts_page(&user, false, Page::new(2).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn archived_posts_only_for_owner_listing() {
        let (db, user, posts) = seeded(3);
        db.set_post_archived(&posts[1].id, true).unwrap();

        let public = db.user_posts_page(&user, false, Page::FIRST).unwrap();
        assert_eq!(contents(&public), ["post 1", "post 3"]);

        let own = db.user_posts_page(&user, true, Page::FIRST).unwrap();
        assert_eq!(own.len(), 3);
    }

    #[test]
    fn feed_is_newest_first_with_owner_details() {
        let (db, _, posts) = seeded(6);
        let other = db.create_user("quiet", "quiet@example.com", "hash").unwrap();
        db.create_post(&other.id, "hidden by archive").unwrap();
        db.set_profile_archived(&other.id, true).unwrap();
        db.set_post_archived(&posts[0].id, true).unwrap();

        let first = db.feed_page(Page::FIRST).unwrap();
        let names: Vec<_> = first.iter().map(|f| f.post.content.as_str()).collect();
        assert_eq!(names, ["post 6", "post 5", "post 4", "post 3", "post 2"]);
        assert!(first.iter().all(|f| f.owner_username == "pager"));

        let second = db.feed_page(Page::new(2).unwrap()).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn comments_and_likes_paginate_in_insertion_order() {
        let (db, author, posts) = seeded(1);
        let post = &posts[0];

        for i in 1..=6 {
            db.create_comment(&post.id, &author, &format!("c{i}")).unwrap();
        }
        let second = db.post_comments_page(&post.id, Page::new(2).unwrap()).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].content, "c6");

        let mine = db.user_comments_page(&author, Page::FIRST).unwrap();
        assert_eq!(mine.len(), PAGE_SIZE);

        let fan = db.create_user("fan", "fan@example.com", "hash").unwrap();
        db.create_like(&post.id, &author).unwrap();
        db.create_like(&post.id, &fan.id).unwrap();
        let likes = db.post_likes_page(&post.id, Page::FIRST).unwrap();
        let owners: Vec<_> = likes.iter().map(|l| l.owner_id.clone()).collect();
        assert_eq!(owners, [author.clone(), fan.id]);
    }
}
