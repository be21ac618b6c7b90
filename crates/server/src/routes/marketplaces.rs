use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::OptionalExtension;

use salesdesk_api::{
    CreateMarketplaceRequest, ListMarketplaceTypesResponse, ListMarketplacesResponse,
    MarketplaceResponse, MarketplaceType, OkResponse, db as dbq, service,
};

use super::auth::AuthUser;
use crate::error::ApiErr;
use crate::extract::ApiJson;
use crate::storage::{
    Db, is_constraint_violation, marketplace_from_row, sq_execute, sq_query_map, sq_query_row,
};

/// GET /api/marketplace-types: the marketplace catalog, ordered by name.
pub async fn list_types(
    State(db): State<Db>,
    _user: AuthUser,
) -> Result<Json<ListMarketplaceTypesResponse>, ApiErr> {
    let conn = db.conn();
    let marketplace_types = sq_query_map(&conn, dbq::marketplaces::list_types(), |row| {
        Ok(MarketplaceType {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
    .map_err(ApiErr::from_db("list marketplace types"))?;
    Ok(Json(ListMarketplaceTypesResponse { marketplace_types }))
}

/// GET /api/marketplaces: the caller's marketplaces.
pub async fn list(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListMarketplacesResponse>, ApiErr> {
    let conn = db.conn();
    let marketplaces = sq_query_map(
        &conn,
        dbq::marketplaces::list_for_user(user.user_id),
        marketplace_from_row,
    )
    .map_err(ApiErr::from_db("list marketplaces"))?;
    Ok(Json(ListMarketplacesResponse { marketplaces }))
}

/// POST /api/marketplaces: add a catalog marketplace to the caller's account.
pub async fn create(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateMarketplaceRequest>,
) -> Result<(StatusCode, Json<MarketplaceResponse>), ApiErr> {
    let conn = db.conn();

    let type_exists = sq_query_row(
        &conn,
        dbq::marketplaces::get_type(req.marketplace_type_id),
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map_err(ApiErr::from_db("lookup marketplace type"))?
    .is_some();
    if !type_exists {
        return Err(ApiErr::not_found(service::MSG_MARKETPLACE_TYPE_MISSING));
    }

    match sq_execute(
        &conn,
        dbq::marketplaces::insert(user.user_id, req.marketplace_type_id),
    ) {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(ApiErr::conflict(service::MSG_MARKETPLACE_DUPLICATE));
        }
        Err(e) => return Err(ApiErr::from_db("insert marketplace")(e)),
    }

    let marketplace = sq_query_row(
        &conn,
        dbq::marketplaces::get_by_id(conn.last_insert_rowid()),
        marketplace_from_row,
    )
    .map_err(ApiErr::from_db("reload marketplace"))?;
    tracing::info!(
        user_id = user.user_id,
        marketplace_id = marketplace.id,
        "marketplace added: {}",
        marketplace.name
    );
    Ok((StatusCode::CREATED, Json(marketplace)))
}

/// DELETE /api/marketplaces/{id}: remove a marketplace and its sales entries.
pub async fn delete(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();

    let owner: Option<i64> = sq_query_row(&conn, dbq::marketplaces::get_owner(id), |row| {
        row.get(0)
    })
    .optional()
    .map_err(ApiErr::from_db("lookup marketplace owner"))?;
    match owner {
        None => return Err(ApiErr::not_found("Marketplace not found")),
        Some(owner) if owner != user.user_id => {
            return Err(ApiErr::forbidden(service::MSG_NO_PERMISSION));
        }
        Some(_) => {}
    }

    sq_execute(&conn, dbq::marketplaces::delete(id))
        .map_err(ApiErr::from_db("delete marketplace"))?;
    tracing::info!(user_id = user.user_id, marketplace_id = id, "marketplace deleted");
    Ok(Json(OkResponse { ok: true }))
}
