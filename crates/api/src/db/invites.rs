//! Invite code query builders.

use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{InviteCodes, Users};

/// INSERT a new invite code.
pub fn insert(code: &str, email: &str, created_by: i64) -> Built {
    Query::insert()
        .into_table(InviteCodes::Table)
        .columns([InviteCodes::Code, InviteCodes::Email, InviteCodes::CreatedBy])
        .values_panic([code.into(), email.into(), created_by.into()])
        .build(SqliteQueryBuilder)
}

/// Lookup an invite by code (returns id, code, email, used).
pub fn lookup_by_code(code: &str) -> Built {
    Query::select()
        .columns([
            InviteCodes::Id,
            InviteCodes::Code,
            InviteCodes::Email,
            InviteCodes::Used,
        ])
        .from(InviteCodes::Table)
        .and_where(Expr::col(InviteCodes::Code).eq(code))
        .build(SqliteQueryBuilder)
}

/// Consume an invite. Matches nothing if it was already used, so callers
/// must check the affected row count.
pub fn mark_used(id: i64, used_by: i64, used_at: &str) -> Built {
    Query::update()
        .table(InviteCodes::Table)
        .value(InviteCodes::Used, true)
        .value(InviteCodes::UsedBy, used_by)
        .value(InviteCodes::UsedAt, used_at)
        .and_where(Expr::col(InviteCodes::Id).eq(id))
        .and_where(Expr::col(InviteCodes::Used).eq(false))
        .build(SqliteQueryBuilder)
}

/// All invites, newest first, with the consuming user's email.
///
/// Columns: id, code, email, used, created_at, used_at, used_by_email.
pub fn list_all() -> Built {
    Query::select()
        .column((InviteCodes::Table, InviteCodes::Id))
        .column((InviteCodes::Table, InviteCodes::Code))
        .column((InviteCodes::Table, InviteCodes::Email))
        .column((InviteCodes::Table, InviteCodes::Used))
        .column((InviteCodes::Table, InviteCodes::CreatedAt))
        .column((InviteCodes::Table, InviteCodes::UsedAt))
        .expr_as(
            Expr::col((Users::Table, Users::Email)),
            Alias::new("used_by_email"),
        )
        .from(InviteCodes::Table)
        .left_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((InviteCodes::Table, InviteCodes::UsedBy)),
        )
        .order_by((InviteCodes::Table, InviteCodes::CreatedAt), Order::Desc)
        .order_by((InviteCodes::Table, InviteCodes::Id), Order::Desc)
        .build(SqliteQueryBuilder)
}
