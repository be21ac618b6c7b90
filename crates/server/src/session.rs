//! Session issuance, validation, and invalidation.
//!
//! The browser holds a random token; the database only stores
//! `sha256(token)` as the session id.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use salesdesk_api::{ServiceError, UserResponse, crypto, db, service};

use crate::storage::{sq_execute, sq_query_row, user_from_row_at};

/// Create a session for `user_id` and return the raw token for the cookie.
///
/// Takes a plain connection so it can run inside a caller's transaction.
pub fn issue_session(
    conn: &Connection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let token = crypto::generate_session_token()?;
    let session_id = crypto::session_id_for(&token);
    let expires_at = service::format_sqlite_datetime(service::session_expiry(now));
    sq_execute(conn, db::sessions::insert(&session_id, user_id, &expires_at))
        .map_err(ServiceError::from_db("insert session"))?;
    Ok(token)
}

/// Resolve a session token to its user.
///
/// Expired sessions are deleted and treated as absent. Sessions inside the
/// renewal window get a fresh 30-day expiry.
pub fn validate_session(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<UserResponse>, ServiceError> {
    let session_id = crypto::session_id_for(token);
    let found = sq_query_row(conn, db::sessions::lookup_with_user(&session_id), |row| {
        Ok((row.get::<_, String>(0)?, user_from_row_at(row, 1)?))
    })
    .optional()
    .map_err(ServiceError::from_db("lookup session"))?;

    let Some((expires_raw, user)) = found else {
        return Ok(None);
    };

    let Some(expires_at) = service::parse_sqlite_datetime(&expires_raw) else {
        tracing::warn!("session {session_id} has unparseable expiry {expires_raw:?}; dropping");
        invalidate_session(conn, &session_id)?;
        return Ok(None);
    };

    if service::session_expired(expires_at, now) {
        invalidate_session(conn, &session_id)?;
        return Ok(None);
    }

    if service::session_needs_renewal(expires_at, now) {
        let renewed = service::format_sqlite_datetime(service::session_expiry(now));
        sq_execute(conn, db::sessions::update_expiry(&session_id, &renewed))
            .map_err(ServiceError::from_db("renew session"))?;
        tracing::debug!(user_id = user.id, "session renewed");
    }

    Ok(Some(user))
}

/// Delete a session by its id (the hashed token).
pub fn invalidate_session(conn: &Connection, session_id: &str) -> Result<(), ServiceError> {
    sq_execute(conn, db::sessions::delete(session_id))
        .map_err(ServiceError::from_db("delete session"))?;
    Ok(())
}

/// Drop every expired session. Returns how many were removed.
pub fn purge_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize, ServiceError> {
    sq_execute(
        conn,
        db::sessions::delete_expired(&service::format_sqlite_datetime(now)),
    )
    .map_err(ServiceError::from_db("purge sessions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_db;

    fn now() -> DateTime<Utc> {
        service::parse_sqlite_datetime("2024-03-01 12:00:00").unwrap()
    }

    fn seed_user(conn: &Connection) -> i64 {
        sq_execute(conn, db::users::insert("u@example.com", "g-1", "U", false)).unwrap();
        conn.last_insert_rowid()
    }

    fn stored_expiry(conn: &Connection, token: &str) -> Option<String> {
        conn.query_row(
            "SELECT expires_at FROM sessions WHERE id = ?1",
            [crypto::session_id_for(token)],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
    }

    #[test]
    fn issued_session_resolves_to_user() {
        let db = test_db();
        let conn = db.conn();
        let user_id = seed_user(&conn);
        let token = issue_session(&conn, user_id, now()).unwrap();

        let user = validate_session(&conn, &token, now()).unwrap().unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.email, "u@example.com");

        // Token itself is never stored.
        let raw: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions WHERE id = ?1", [&token], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(raw, 0);
    }

    #[test]
    fn unknown_token_is_absent() {
        let db = test_db();
        let conn = db.conn();
        assert!(validate_session(&conn, "nope", now()).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_deleted() {
        let db = test_db();
        let conn = db.conn();
        let user_id = seed_user(&conn);
        let token = issue_session(&conn, user_id, now()).unwrap();

        let later = now() + chrono::Duration::days(31);
        assert!(validate_session(&conn, &token, later).unwrap().is_none());
        assert_eq!(stored_expiry(&conn, &token), None);
    }

    #[test]
    fn session_renews_inside_window_only() {
        let db = test_db();
        let conn = db.conn();
        let user_id = seed_user(&conn);
        let token = issue_session(&conn, user_id, now()).unwrap();
        let original = stored_expiry(&conn, &token).unwrap();

        let early = now() + chrono::Duration::days(5);
        validate_session(&conn, &token, early).unwrap().unwrap();
        assert_eq!(stored_expiry(&conn, &token).unwrap(), original);

        let late = now() + chrono::Duration::days(20);
        validate_session(&conn, &token, late).unwrap().unwrap();
        let renewed = stored_expiry(&conn, &token).unwrap();
        assert_eq!(
            renewed,
            service::format_sqlite_datetime(service::session_expiry(late))
        );
    }

    #[test]
    fn purge_removes_only_expired() {
        let db = test_db();
        let conn = db.conn();
        let user_id = seed_user(&conn);
        let old = issue_session(&conn, user_id, now() - chrono::Duration::days(40)).unwrap();
        let fresh = issue_session(&conn, user_id, now()).unwrap();

        assert_eq!(purge_expired(&conn, now()).unwrap(), 1);
        assert!(stored_expiry(&conn, &old).is_none());
        assert!(stored_expiry(&conn, &fresh).is_some());
    }
}
