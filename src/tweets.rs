use crate::db::now_millis;
use crate::error::AppError;
use crate::model::{Author, FeedPage, FeedTweet, Tweet};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Tweet text bounds, counted in Unicode scalar values.
pub const TEXT_MIN: usize = 5;
pub const TEXT_MAX: usize = 180;

/// Page size bounds for the feed.
pub const LIMIT_MIN: i64 = 1;
pub const LIMIT_MAX: i64 = 100;
pub const LIMIT_DEFAULT: i64 = 10;

/// Create a tweet authored by the given user. Text length is validated
/// before anything is written.
pub fn create_tweet(conn: &Connection, author_id: &Uuid, text: &str) -> Result<Tweet, AppError> {
    let len = text.chars().count();
    if !(TEXT_MIN..=TEXT_MAX).contains(&len) {
        return Err(AppError::Validation("text_length"));
    }
    let id = Uuid::new_v4();
    let now = now_millis();
    conn.execute(
        "INSERT INTO tweets (id, text, created_at, author_id) VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), text, now, author_id.to_string()],
    )?;
    Ok(Tweet {
        id,
        text: text.into(),
        created_at: now,
        author_id: *author_id,
    })
}

/// One page of the feed for a viewer, newest first.
///
/// Keyset pagination over (created_at DESC, id DESC); the id tie-break makes
/// the order total even when timestamps collide. The cursor is the id of the
/// last tweet of the previous page; rows strictly after its position are
/// returned. `next_cursor` is set iff a full page came back.
pub fn list_feed(
    conn: &Connection,
    viewer_id: &Uuid,
    limit: usize,
    cursor: Option<&Uuid>,
) -> Result<FeedPage, AppError> {
    let (ts, id) = match cursor {
        Some(c) => {
            let mut stmt = conn.prepare("SELECT created_at FROM tweets WHERE id = ?1")?;
            let ts: Option<i64> = stmt
                .query_row([c.to_string()], |row| row.get(0))
                .optional()?;
            match ts {
                Some(ts) => (ts, *c),
                None => return Err(AppError::NotFound("cursor_not_found")),
            }
        }
        None => (i64::MAX, Uuid::nil()),
    };
    let mut stmt = conn.prepare(
        "SELECT t.id, t.text, t.created_at, u.name, u.image, \
         (SELECT COUNT(*) FROM likes l WHERE l.tweet_id = t.id), \
         EXISTS(SELECT 1 FROM likes l WHERE l.tweet_id = t.id AND l.user_id = ?4) \
         FROM tweets t JOIN users u ON u.id = t.author_id \
         WHERE t.created_at < ?1 OR (t.created_at = ?1 AND t.id < ?2) \
         ORDER BY t.created_at DESC, t.id DESC LIMIT ?3",
    )?;
    let iter = stmt.query_map(
        params![ts, id.to_string(), limit as i64, viewer_id.to_string()],
        |row| {
            Ok(FeedTweet {
                id: Uuid::parse_str(row.get::<_, String>(0)?.as_str()).unwrap(),
                text: row.get(1)?,
                created_at: row.get(2)?,
                author: Author {
                    name: row.get(3)?,
                    image: row.get(4)?,
                },
                like_count: row.get(5)?,
                liked: row.get::<_, i64>(6)? != 0,
            })
        },
    )?;
    let mut tweets = Vec::new();
    for t in iter {
        tweets.push(t?);
    }
    let next_cursor = if tweets.len() == limit {
        tweets.last().map(|t| t.id)
    } else {
        None
    };
    Ok(FeedPage {
        tweets,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, users};
    use crate::model::User;

    fn seed_user(conn: &Connection) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            name: "alice".into(),
            email: "alice@example.com".into(),
            image: Some("https://example.com/a.png".into()),
        };
        users::insert_user(conn, &user).unwrap();
        user.id
    }

    fn insert_at(conn: &Connection, author: &Uuid, text: &str, ts: i64) -> Uuid {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO tweets (id, text, created_at, author_id) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), text, ts, author.to_string()],
        )
        .unwrap();
        id
    }

    #[test]
    fn text_length_validated() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_user(&conn);
        assert!(matches!(
            create_tweet(&conn, &alice, "Hi").unwrap_err(),
            AppError::Validation("text_length")
        ));
        let long = "x".repeat(181);
        assert!(create_tweet(&conn, &alice, &long).is_err());
        // rejected input writes nothing
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tweets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        let t = create_tweet(&conn, &alice, "Hello World").unwrap();
        assert_eq!(t.text, "Hello World");
        assert_eq!(t.author_id, alice);
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_user(&conn);
        // five scalar values, more than five bytes
        assert!(create_tweet(&conn, &alice, "äöüßé").is_ok());
        let long: String = "é".repeat(180);
        assert!(create_tweet(&conn, &alice, &long).is_ok());
    }

    #[test]
    fn pagination_stitches_without_gaps() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_user(&conn);
        for (i, text) in ["tweet one", "tweet two", "tweet three", "tweet four", "tweet five"]
            .iter()
            .enumerate()
        {
            insert_at(&conn, &alice, text, 1_000 + i as i64);
        }
        let all = list_feed(&conn, &alice, 50, None).unwrap();
        assert_eq!(all.tweets.len(), 5);
        assert_eq!(all.tweets[0].text, "tweet five");
        assert!(all.next_cursor.is_none());

        let page1 = list_feed(&conn, &alice, 2, None).unwrap();
        assert_eq!(page1.tweets.len(), 2);
        assert_eq!(page1.next_cursor, Some(page1.tweets[1].id));
        let page2 = list_feed(&conn, &alice, 2, page1.next_cursor.as_ref()).unwrap();
        assert_eq!(page2.next_cursor, Some(page2.tweets[1].id));
        let page3 = list_feed(&conn, &alice, 2, page2.next_cursor.as_ref()).unwrap();
        assert_eq!(page3.tweets.len(), 1);
        assert!(page3.next_cursor.is_none());

        let mut combined = page1.tweets.clone();
        combined.extend(page2.tweets.clone());
        combined.extend(page3.tweets.clone());
        assert_eq!(combined, all.tweets);
    }

    #[test]
    fn full_final_page_yields_one_empty_page() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_user(&conn);
        insert_at(&conn, &alice, "only tweet", 1_000);
        let page = list_feed(&conn, &alice, 1, None).unwrap();
        assert_eq!(page.next_cursor, Some(page.tweets[0].id));
        let tail = list_feed(&conn, &alice, 1, page.next_cursor.as_ref()).unwrap();
        assert!(tail.tweets.is_empty());
        assert!(tail.next_cursor.is_none());
    }

    #[test]
    fn equal_timestamps_keep_total_order() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_user(&conn);
        for text in ["same one", "same two", "same three"] {
            insert_at(&conn, &alice, text, 5_000);
        }
        let all = list_feed(&conn, &alice, 50, None).unwrap();
        // ids descend within the shared timestamp
        let ids: Vec<String> = all.tweets.iter().map(|t| t.id.to_string()).collect();
        let mut sorted = ids.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(ids, sorted);

        let page1 = list_feed(&conn, &alice, 2, None).unwrap();
        let page2 = list_feed(&conn, &alice, 2, page1.next_cursor.as_ref()).unwrap();
        let mut combined = page1.tweets.clone();
        combined.extend(page2.tweets.clone());
        assert_eq!(combined, all.tweets);
    }

    #[test]
    fn unknown_cursor_is_not_found() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_user(&conn);
        let err = list_feed(&conn, &alice, 10, Some(&Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, AppError::NotFound("cursor_not_found")));
    }

    #[test]
    fn author_projection_joined() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_user(&conn);
        create_tweet(&conn, &alice, "Hello World").unwrap();
        let page = list_feed(&conn, &alice, 10, None).unwrap();
        assert_eq!(page.tweets[0].author.name, "alice");
        assert_eq!(
            page.tweets[0].author.image.as_deref(),
            Some("https://example.com/a.png")
        );
        assert_eq!(page.tweets[0].like_count, 0);
        assert!(!page.tweets[0].liked);
    }
}
