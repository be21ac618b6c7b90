//! Sales entry query builders.

use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{MarketplaceTypes, Marketplaces, SalesEntries};

fn select_with_marketplace() -> sea_query::SelectStatement {
    Query::select()
        .column((SalesEntries::Table, SalesEntries::Id))
        .column((SalesEntries::Table, SalesEntries::MarketplaceId))
        .expr_as(
            Expr::col((MarketplaceTypes::Table, MarketplaceTypes::Name)),
            Alias::new("marketplace_name"),
        )
        .column((SalesEntries::Table, SalesEntries::Date))
        .column((SalesEntries::Table, SalesEntries::Amount))
        .column((SalesEntries::Table, SalesEntries::CreatedAt))
        .column((SalesEntries::Table, SalesEntries::UpdatedAt))
        .from(SalesEntries::Table)
        .inner_join(
            Marketplaces::Table,
            Expr::col((Marketplaces::Table, Marketplaces::Id))
                .equals((SalesEntries::Table, SalesEntries::MarketplaceId)),
        )
        .inner_join(
            MarketplaceTypes::Table,
            Expr::col((MarketplaceTypes::Table, MarketplaceTypes::Id))
                .equals((Marketplaces::Table, Marketplaces::MarketplaceTypeId)),
        )
        .to_owned()
}

/// A user's sales entries, newest date first, with the marketplace name.
///
/// Columns: id, marketplace_id, marketplace_name, date, amount, created_at, updated_at.
pub fn list_for_user(user_id: i64, marketplace_id: Option<i64>) -> Built {
    let mut query = select_with_marketplace();
    query.and_where(Expr::col((SalesEntries::Table, SalesEntries::UserId)).eq(user_id));

    if let Some(marketplace_id) = marketplace_id {
        query.and_where(
            Expr::col((SalesEntries::Table, SalesEntries::MarketplaceId)).eq(marketplace_id),
        );
    }

    query
        .order_by((SalesEntries::Table, SalesEntries::Date), Order::Desc)
        .order_by((SalesEntries::Table, SalesEntries::Id), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// One entry by id, same columns as [`list_for_user`].
pub fn get_by_id(id: i64) -> Built {
    select_with_marketplace()
        .and_where(Expr::col((SalesEntries::Table, SalesEntries::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Insert or overwrite the entry for `(user, marketplace, date)`.
pub fn upsert(user_id: i64, marketplace_id: i64, date: &str, amount: &str) -> Built {
    // ON CONFLICT ... DO UPDATE with excluded.* is clearer as raw SQL
    let sql = concat!(
        "INSERT INTO \"sales_entries\" (\"user_id\", \"marketplace_id\", \"date\", \"amount\") ",
        "VALUES (?, ?, ?, ?) ",
        "ON CONFLICT (\"user_id\", \"marketplace_id\", \"date\") DO UPDATE SET ",
        "\"amount\" = excluded.\"amount\", ",
        "\"updated_at\" = datetime('now')",
    )
    .to_string();
    let values = sea_query::Values(vec![
        user_id.into(),
        marketplace_id.into(),
        date.into(),
        amount.into(),
    ]);
    (sql, values)
}

/// Lookup the entry id stored for `(user, marketplace, date)`.
pub fn find_id(user_id: i64, marketplace_id: i64, date: &str) -> Built {
    Query::select()
        .column(SalesEntries::Id)
        .from(SalesEntries::Table)
        .and_where(Expr::col(SalesEntries::UserId).eq(user_id))
        .and_where(Expr::col(SalesEntries::MarketplaceId).eq(marketplace_id))
        .and_where(Expr::col(SalesEntries::Date).eq(date))
        .build(SqliteQueryBuilder)
}

/// Owner of a sales entry (returns user_id).
pub fn get_owner(id: i64) -> Built {
    Query::select()
        .column(SalesEntries::UserId)
        .from(SalesEntries::Table)
        .and_where(Expr::col(SalesEntries::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Delete a sales entry by id.
pub fn delete(id: i64) -> Built {
    Query::delete()
        .from_table(SalesEntries::Table)
        .and_where(Expr::col(SalesEntries::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// `(date, amount)` for every entry of a user, for statistics.
pub fn amounts_for_user(user_id: i64) -> Built {
    Query::select()
        .columns([SalesEntries::Date, SalesEntries::Amount])
        .from(SalesEntries::Table)
        .and_where(Expr::col(SalesEntries::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_filters_by_marketplace_only_when_given() {
        let (all, all_values) = list_for_user(7, None);
        let (one, one_values) = list_for_user(7, Some(3));
        assert_eq!(all_values.0.len(), 1);
        assert_eq!(one_values.0.len(), 2);
        assert!(one.len() > all.len());
        assert!(all.contains("ORDER BY \"sales_entries\".\"date\" DESC"));
    }

    #[test]
    fn upsert_binds_four_values() {
        let (sql, values) = upsert(1, 2, "2024-01-15", "100.50");
        assert!(sql.contains("ON CONFLICT"));
        assert_eq!(sql.matches('?').count(), values.0.len());
    }
}
