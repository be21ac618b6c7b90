//! User query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Users;

/// Columns selected for every user row, in [`crate::UserResponse`] order:
/// id, email, name, is_admin, created_at.
const USER_COLUMNS: [Users; 5] = [
    Users::Id,
    Users::Email,
    Users::Name,
    Users::IsAdmin,
    Users::CreatedAt,
];

/// Find user by the provider's subject id.
pub fn get_by_google_id(google_id: &str) -> Built {
    Query::select()
        .columns(USER_COLUMNS)
        .from(Users::Table)
        .and_where(Expr::col(Users::GoogleId).eq(google_id))
        .build(SqliteQueryBuilder)
}

/// Count all users.
pub fn count() -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Users::Table)
        .build(SqliteQueryBuilder)
}

/// Insert a user signed in through the OAuth provider.
pub fn insert(email: &str, google_id: &str, name: &str, is_admin: bool) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Email, Users::GoogleId, Users::Name, Users::IsAdmin])
        .values_panic([email.into(), google_id.into(), name.into(), is_admin.into()])
        .build(SqliteQueryBuilder)
}

/// All users, newest first.
pub fn list_all() -> Built {
    Query::select()
        .columns(USER_COLUMNS)
        .from(Users::Table)
        .order_by(Users::CreatedAt, Order::Desc)
        .order_by(Users::Id, Order::Desc)
        .build(SqliteQueryBuilder)
}
