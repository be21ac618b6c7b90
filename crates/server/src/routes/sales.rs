use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension;

use salesdesk_api::{
    ListSalesEntriesResponse, OkResponse, SalesEntryFilter, SalesEntryResponse, SalesStatistics,
    UpsertSalesEntryRequest, db as dbq, service,
};

use super::auth::AuthUser;
use crate::error::ApiErr;
use crate::extract::{ApiJson, ApiQuery};
use crate::storage::{Db, decimal_at, sales_entry_from_row, sq_execute, sq_query_map, sq_query_row};

/// Calendar date used for "no future dates" and the statistics windows.
fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// GET /api/sales: the caller's entries, newest date first.
pub async fn list(
    State(db): State<Db>,
    user: AuthUser,
    ApiQuery(filter): ApiQuery<SalesEntryFilter>,
) -> Result<Json<ListSalesEntriesResponse>, ApiErr> {
    let conn = db.conn();
    let sales_entries = sq_query_map(
        &conn,
        dbq::sales::list_for_user(user.user_id, filter.marketplace_id),
        sales_entry_from_row,
    )
    .map_err(ApiErr::from_db("list sales entries"))?;
    Ok(Json(ListSalesEntriesResponse { sales_entries }))
}

/// Validate and store the figure for `(user, marketplace, date)`, replacing
/// any earlier figure for the same day.
fn upsert_entry(
    db: &Db,
    user: &AuthUser,
    req: &UpsertSalesEntryRequest,
    today: NaiveDate,
) -> Result<SalesEntryResponse, ApiErr> {
    let date = service::validate_sales_date(&req.date, today)?;
    let amount = service::validate_sales_amount(service::parse_sales_amount(&req.amount)?)?;
    let date = date.format("%Y-%m-%d").to_string();

    let conn = db.conn();
    let owner: Option<i64> = sq_query_row(
        &conn,
        dbq::marketplaces::get_owner(req.marketplace_id),
        |row| row.get(0),
    )
    .optional()
    .map_err(ApiErr::from_db("lookup marketplace owner"))?;
    if owner != Some(user.user_id) {
        return Err(ApiErr::not_found(service::MSG_MARKETPLACE_GONE));
    }

    sq_execute(
        &conn,
        dbq::sales::upsert(user.user_id, req.marketplace_id, &date, &amount.to_string()),
    )
    .map_err(ApiErr::from_db("upsert sales entry"))?;

    let id: i64 = sq_query_row(
        &conn,
        dbq::sales::find_id(user.user_id, req.marketplace_id, &date),
        |row| row.get(0),
    )
    .map_err(ApiErr::from_db("reload sales entry id"))?;
    let entry = sq_query_row(&conn, dbq::sales::get_by_id(id), sales_entry_from_row)
        .map_err(ApiErr::from_db("reload sales entry"))?;

    tracing::debug!(
        user_id = user.user_id,
        marketplace_id = req.marketplace_id,
        "sales entry saved for {date}"
    );
    Ok(entry)
}

/// PUT /api/sales: create or overwrite the figure for one marketplace and day.
pub async fn upsert(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpsertSalesEntryRequest>,
) -> Result<Json<SalesEntryResponse>, ApiErr> {
    upsert_entry(&db, &user, &req, today()).map(Json)
}

/// DELETE /api/sales/{id}
pub async fn delete(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();

    let owner: Option<i64> = sq_query_row(&conn, dbq::sales::get_owner(id), |row| row.get(0))
        .optional()
        .map_err(ApiErr::from_db("lookup sales entry owner"))?;
    match owner {
        None => return Err(ApiErr::not_found("Sales entry not found")),
        Some(owner) if owner != user.user_id => {
            return Err(ApiErr::forbidden(service::MSG_NO_PERMISSION));
        }
        Some(_) => {}
    }

    sq_execute(&conn, dbq::sales::delete(id)).map_err(ApiErr::from_db("delete sales entry"))?;
    Ok(Json(OkResponse { ok: true }))
}

fn statistics_at(db: &Db, user: &AuthUser, today: NaiveDate) -> Result<SalesStatistics, ApiErr> {
    let conn = db.conn();
    let rows = sq_query_map(&conn, dbq::sales::amounts_for_user(user.user_id), |row| {
        Ok((row.get::<_, String>(0)?, decimal_at(row, 1)?))
    })
    .map_err(ApiErr::from_db("load sales amounts"))?;

    let entries = rows.into_iter().filter_map(|(raw, amount)| {
        match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => Some((date, amount)),
            Err(_) => {
                tracing::warn!("skipping sales entry with malformed date {raw:?}");
                None
            }
        }
    });
    Ok(service::sales_statistics(entries, today))
}

/// GET /api/sales/statistics: totals for all time, this month, and this week.
pub async fn statistics(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<SalesStatistics>, ApiErr> {
    statistics_at(&db, &user, today()).map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_db;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use salesdesk_api::AmountInput;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed_user(db: &Db, email: &str, sub: &str) -> AuthUser {
        let conn = db.conn();
        sq_execute(&conn, dbq::users::insert(email, sub, "User", false)).unwrap();
        AuthUser {
            user_id: conn.last_insert_rowid(),
            is_admin: false,
        }
    }

    fn seed_marketplace(db: &Db, user: &AuthUser, type_name: &str) -> i64 {
        let conn = db.conn();
        let type_id: i64 = conn
            .query_row(
                "SELECT id FROM marketplace_types WHERE name = ?1",
                [type_name],
                |row| row.get(0),
            )
            .unwrap();
        sq_execute(&conn, dbq::marketplaces::insert(user.user_id, type_id)).unwrap();
        conn.last_insert_rowid()
    }

    fn req(marketplace_id: i64, date: &str, amount: &str) -> UpsertSalesEntryRequest {
        UpsertSalesEntryRequest {
            marketplace_id,
            date: date.into(),
            amount: AmountInput::Text(amount.into()),
        }
    }

    #[test]
    fn upsert_overwrites_same_day_and_normalizes_amount() {
        let db = test_db();
        let user = seed_user(&db, "a@example.com", "g-a");
        let market = seed_marketplace(&db, &user, "Amazon");
        let today = d("2024-03-15");

        let first = upsert_entry(&db, &user, &req(market, "2024-03-10", "100.5"), today).unwrap();
        assert_eq!(first.amount.to_string(), "100.50");
        assert_eq!(first.marketplace_name, "Amazon");
        assert_eq!(first.date, "2024-03-10");

        let second =
            upsert_entry(&db, &user, &req(market, "2024-03-10", "42.125"), today).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.amount.to_string(), "42.13");

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM sales_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn upsert_validates_date_amount_and_marketplace() {
        let db = test_db();
        let alice = seed_user(&db, "a@example.com", "g-a");
        let bob = seed_user(&db, "b@example.com", "g-b");
        let market = seed_marketplace(&db, &alice, "Amazon");
        let today = d("2024-03-15");

        let err = upsert_entry(&db, &alice, &req(market, "2024-03-16", "1"), today).unwrap_err();
        assert_eq!(err.message(), service::MSG_FUTURE_DATE);

        let err = upsert_entry(&db, &alice, &req(market, "15/03/2024", "1"), today).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = upsert_entry(&db, &alice, &req(market, "2024-03-15", "-0.01"), today)
            .unwrap_err();
        assert_eq!(err.message(), service::MSG_NEGATIVE_AMOUNT);

        let err = upsert_entry(&db, &alice, &req(market, "2024-03-15", "abc"), today)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), service::MSG_AMOUNT_NOT_NUMBER);

        let err = upsert_entry(&db, &bob, &req(market, "2024-03-15", "1"), today).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), service::MSG_MARKETPLACE_GONE);

        let err =
            upsert_entry(&db, &alice, &req(market + 50, "2024-03-15", "1"), today).unwrap_err();
        assert_eq!(err.message(), service::MSG_MARKETPLACE_GONE);
    }

    #[tokio::test]
    async fn list_is_scoped_to_caller_and_filterable() {
        let db = test_db();
        let alice = seed_user(&db, "a@example.com", "g-a");
        let bob = seed_user(&db, "b@example.com", "g-b");
        let amazon = seed_marketplace(&db, &alice, "Amazon");
        let ebay = seed_marketplace(&db, &alice, "eBay");
        let bob_market = seed_marketplace(&db, &bob, "Amazon");
        let today = d("2024-03-15");

        upsert_entry(&db, &alice, &req(amazon, "2024-03-01", "10"), today).unwrap();
        upsert_entry(&db, &alice, &req(ebay, "2024-03-05", "20"), today).unwrap();
        upsert_entry(&db, &bob, &req(bob_market, "2024-03-05", "99"), today).unwrap();

        let Json(all) = list(State(db.clone()), alice.clone(), ApiQuery(SalesEntryFilter::default()))
            .await
            .unwrap();
        let dates: Vec<_> = all.sales_entries.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, ["2024-03-05", "2024-03-01"]);

        let Json(only_ebay) = list(
            State(db.clone()),
            alice,
            ApiQuery(SalesEntryFilter {
                marketplace_id: Some(ebay),
            }),
        )
        .await
        .unwrap();
        assert_eq!(only_ebay.sales_entries.len(), 1);
        assert_eq!(only_ebay.sales_entries[0].marketplace_name, "eBay");
    }

    #[tokio::test]
    async fn delete_checks_ownership() {
        let db = test_db();
        let alice = seed_user(&db, "a@example.com", "g-a");
        let bob = seed_user(&db, "b@example.com", "g-b");
        let market = seed_marketplace(&db, &alice, "Amazon");
        let entry =
            upsert_entry(&db, &alice, &req(market, "2024-03-01", "10"), d("2024-03-15")).unwrap();

        let err = delete(State(db.clone()), bob, Path(entry.id)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = delete(State(db.clone()), alice.clone(), Path(entry.id + 1))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let Json(resp) = delete(State(db.clone()), alice.clone(), Path(entry.id))
            .await
            .unwrap();
        assert!(resp.ok);
        let Json(left) = list(State(db), alice, ApiQuery(SalesEntryFilter::default()))
            .await
            .unwrap();
        assert!(left.sales_entries.is_empty());
    }

    #[test]
    fn statistics_cover_total_month_and_week_for_caller_only() {
        let db = test_db();
        let alice = seed_user(&db, "a@example.com", "g-a");
        let bob = seed_user(&db, "b@example.com", "g-b");
        let market = seed_marketplace(&db, &alice, "Amazon");
        let bob_market = seed_marketplace(&db, &bob, "Amazon");
        // Friday; the week runs Mon 2024-03-11 to Sun 2024-03-17.
        let today = d("2024-03-15");

        upsert_entry(&db, &alice, &req(market, "2024-02-28", "5.25"), today).unwrap();
        upsert_entry(&db, &alice, &req(market, "2024-03-02", "10"), today).unwrap();
        upsert_entry(&db, &alice, &req(market, "2024-03-11", "1.10"), today).unwrap();
        upsert_entry(&db, &alice, &req(market, "2024-03-15", "2"), today).unwrap();
        upsert_entry(&db, &bob, &req(bob_market, "2024-03-15", "1000"), today).unwrap();

        let stats = statistics_at(&db, &alice, today).unwrap();
        assert_eq!(stats.total_sales.to_string(), "18.35");
        assert_eq!(stats.month_sales.to_string(), "13.10");
        assert_eq!(stats.week_sales.to_string(), "3.10");
    }

    #[test]
    fn statistics_are_zero_without_entries() {
        let db = test_db();
        let alice = seed_user(&db, "a@example.com", "g-a");
        let stats = statistics_at(&db, &alice, d("2024-03-15")).unwrap();
        assert_eq!(stats.total_sales.to_string(), "0.00");
        assert_eq!(stats, SalesStatistics {
            total_sales: Decimal::new(0, 2),
            month_sales: Decimal::new(0, 2),
            week_sales: Decimal::new(0, 2),
        });
    }
}
