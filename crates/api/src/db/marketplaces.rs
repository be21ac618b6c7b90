//! Marketplace catalog and per-user marketplace query builders.

use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{MarketplaceTypes, Marketplaces};

// ── Catalog ────────────────────────────────────────────────────────────────

/// All marketplace types ordered by name.
pub fn list_types() -> Built {
    Query::select()
        .columns([MarketplaceTypes::Id, MarketplaceTypes::Name])
        .from(MarketplaceTypes::Table)
        .order_by(MarketplaceTypes::Name, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Lookup a marketplace type by id (returns id, name).
pub fn get_type(type_id: i64) -> Built {
    Query::select()
        .columns([MarketplaceTypes::Id, MarketplaceTypes::Name])
        .from(MarketplaceTypes::Table)
        .and_where(Expr::col(MarketplaceTypes::Id).eq(type_id))
        .build(SqliteQueryBuilder)
}

// ── User marketplaces ──────────────────────────────────────────────────────

/// INSERT a marketplace for a user.
pub fn insert(user_id: i64, marketplace_type_id: i64) -> Built {
    Query::insert()
        .into_table(Marketplaces::Table)
        .columns([Marketplaces::UserId, Marketplaces::MarketplaceTypeId])
        .values_panic([user_id.into(), marketplace_type_id.into()])
        .build(SqliteQueryBuilder)
}

fn select_with_name() -> sea_query::SelectStatement {
    Query::select()
        .column((Marketplaces::Table, Marketplaces::Id))
        .column((Marketplaces::Table, Marketplaces::MarketplaceTypeId))
        .expr_as(
            Expr::col((MarketplaceTypes::Table, MarketplaceTypes::Name)),
            Alias::new("name"),
        )
        .column((Marketplaces::Table, Marketplaces::CreatedAt))
        .from(Marketplaces::Table)
        .inner_join(
            MarketplaceTypes::Table,
            Expr::col((MarketplaceTypes::Table, MarketplaceTypes::Id))
                .equals((Marketplaces::Table, Marketplaces::MarketplaceTypeId)),
        )
        .to_owned()
}

/// A user's marketplaces ordered by name.
///
/// Columns: id, marketplace_type_id, name, created_at.
pub fn list_for_user(user_id: i64) -> Built {
    select_with_name()
        .and_where(Expr::col((Marketplaces::Table, Marketplaces::UserId)).eq(user_id))
        .order_by((MarketplaceTypes::Table, MarketplaceTypes::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// One marketplace by id, same columns as [`list_for_user`].
pub fn get_by_id(id: i64) -> Built {
    select_with_name()
        .and_where(Expr::col((Marketplaces::Table, Marketplaces::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Owner of a marketplace (returns user_id).
pub fn get_owner(id: i64) -> Built {
    Query::select()
        .column(Marketplaces::UserId)
        .from(Marketplaces::Table)
        .and_where(Expr::col(Marketplaces::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Delete a marketplace. Its sales entries go with it (`ON DELETE CASCADE`).
pub fn delete(id: i64) -> Built {
    Query::delete()
        .from_table(Marketplaces::Table)
        .and_where(Expr::col(Marketplaces::Id).eq(id))
        .build(SqliteQueryBuilder)
}
