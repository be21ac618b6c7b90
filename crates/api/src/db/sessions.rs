//! Browser session query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{Sessions, Users};

/// Insert a session row. `id` is the hashed token, never the token itself.
pub fn insert(id: &str, user_id: i64, expires_at: &str) -> Built {
    Query::insert()
        .into_table(Sessions::Table)
        .columns([Sessions::Id, Sessions::UserId, Sessions::ExpiresAt])
        .values_panic([id.into(), user_id.into(), expires_at.into()])
        .build(SqliteQueryBuilder)
}

/// Lookup a session with its user.
///
/// Columns: session expires_at, then user id, email, name, is_admin, created_at.
pub fn lookup_with_user(id: &str) -> Built {
    Query::select()
        .column((Sessions::Table, Sessions::ExpiresAt))
        .column((Users::Table, Users::Id))
        .column((Users::Table, Users::Email))
        .column((Users::Table, Users::Name))
        .column((Users::Table, Users::IsAdmin))
        .column((Users::Table, Users::CreatedAt))
        .from(Sessions::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Sessions::Table, Sessions::UserId)),
        )
        .and_where(Expr::col((Sessions::Table, Sessions::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Push a session's expiry forward.
pub fn update_expiry(id: &str, expires_at: &str) -> Built {
    Query::update()
        .table(Sessions::Table)
        .value(Sessions::ExpiresAt, expires_at)
        .and_where(Expr::col(Sessions::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Delete a session by id.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Sessions::Table)
        .and_where(Expr::col(Sessions::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Delete every session that expired at or before `now`.
pub fn delete_expired(now: &str) -> Built {
    Query::delete()
        .from_table(Sessions::Table)
        .and_where(Expr::col(Sessions::ExpiresAt).lte(now))
        .build(SqliteQueryBuilder)
}
