use crate::db::now_millis;
use crate::error::AppError;
use crate::model::Like;
use rusqlite::{ffi, params, Connection};
use uuid::Uuid;

/// Like a tweet on behalf of a user.
///
/// The likes table carries `PRIMARY KEY (tweet_id, user_id)`, so the
/// at-most-one-like invariant holds under concurrent calls: the insert either
/// succeeds or fails atomically inside SQLite. A duplicate like surfaces as
/// ConflictError, a missing tweet as NotFoundError (via the FK).
pub fn like_tweet(conn: &Connection, user_id: &Uuid, tweet_id: &Uuid) -> Result<Like, AppError> {
    let now = now_millis();
    let res = conn.execute(
        "INSERT INTO likes (tweet_id, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![tweet_id.to_string(), user_id.to_string(), now],
    );
    match res {
        Ok(_) => Ok(Like {
            tweet_id: *tweet_id,
            user_id: *user_id,
            created_at: now,
        }),
        Err(e) => Err(classify_insert_error(e)),
    }
}

/// Remove a user's like from a tweet. Fails with NotFoundError when no like
/// exists, so unlike from the NotLiked state never silently succeeds.
pub fn unlike_tweet(conn: &Connection, user_id: &Uuid, tweet_id: &Uuid) -> Result<(), AppError> {
    let changed = conn.execute(
        "DELETE FROM likes WHERE tweet_id = ?1 AND user_id = ?2",
        params![tweet_id.to_string(), user_id.to_string()],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound("like_not_found"));
    }
    Ok(())
}

pub fn like_count(conn: &Connection, tweet_id: &Uuid) -> Result<i64, AppError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE tweet_id = ?1",
        [tweet_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn classify_insert_error(err: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        match e.extended_code {
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                return AppError::Conflict("already_liked")
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return AppError::NotFound("tweet_not_found"),
            _ => {}
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::{db, tweets, users};

    fn seed(conn: &Connection) -> (Uuid, Uuid) {
        let alice = User {
            id: Uuid::new_v4(),
            name: "alice".into(),
            email: "alice@example.com".into(),
            image: None,
        };
        users::insert_user(conn, &alice).unwrap();
        let tweet = tweets::create_tweet(conn, &alice.id, "Hello World").unwrap();
        (alice.id, tweet.id)
    }

    #[test]
    fn like_then_unlike_round_trip() {
        let conn = db::init_db(":memory:").unwrap();
        let (alice, tweet) = seed(&conn);
        assert_eq!(like_count(&conn, &tweet).unwrap(), 0);
        let like = like_tweet(&conn, &alice, &tweet).unwrap();
        assert_eq!(like.tweet_id, tweet);
        assert_eq!(like_count(&conn, &tweet).unwrap(), 1);
        unlike_tweet(&conn, &alice, &tweet).unwrap();
        assert_eq!(like_count(&conn, &tweet).unwrap(), 0);
    }

    #[test]
    fn double_like_conflicts() {
        let conn = db::init_db(":memory:").unwrap();
        let (alice, tweet) = seed(&conn);
        like_tweet(&conn, &alice, &tweet).unwrap();
        let err = like_tweet(&conn, &alice, &tweet).unwrap_err();
        assert!(matches!(err, AppError::Conflict("already_liked")));
        assert_eq!(like_count(&conn, &tweet).unwrap(), 1);
    }

    #[test]
    fn like_missing_tweet_is_not_found() {
        let conn = db::init_db(":memory:").unwrap();
        let (alice, _) = seed(&conn);
        let err = like_tweet(&conn, &alice, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::NotFound("tweet_not_found")));
    }

    #[test]
    fn unlike_without_like_is_not_found() {
        let conn = db::init_db(":memory:").unwrap();
        let (alice, tweet) = seed(&conn);
        let err = unlike_tweet(&conn, &alice, &tweet).unwrap_err();
        assert!(matches!(err, AppError::NotFound("like_not_found")));
    }
}
