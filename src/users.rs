use crate::error::AppError;
use crate::model::User;
use rusqlite::{ffi, params, Connection, OptionalExtension};
use uuid::Uuid;

/// Insert a user record. Identity provisioning is external to the feed
/// service; this is called from the startup bootstrap and from tests.
pub fn insert_user(conn: &Connection, user: &User) -> Result<(), AppError> {
    let res = conn.execute(
        "INSERT INTO users (id, name, email, image) VALUES (?1, ?2, ?3, ?4)",
        params![user.id.to_string(), user.name, user.email, user.image],
    );
    match res {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict("duplicate_user")),
        Err(e) => Err(e.into()),
    }
}

/// Resolve a user by id, as done by the auth middleware for every request.
pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, AppError> {
    let mut stmt = conn.prepare("SELECT id, name, email, image FROM users WHERE id = ?1")?;
    let user = stmt
        .query_row([id.to_string()], |row| {
            Ok(User {
                id: Uuid::parse_str(row.get::<_, String>(0)?.as_str()).unwrap(),
                name: row.get(1)?,
                email: row.get(2)?,
                image: row.get(3)?,
            })
        })
        .optional()?;
    Ok(user)
}

pub fn count_users(conn: &Connection) -> Result<i64, AppError> {
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _)
        if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}
