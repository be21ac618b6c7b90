use axum::{Json, extract::State, http::StatusCode};

use salesdesk_api::{
    CreateInviteRequest, CreateInviteResponse, ListInvitesResponse, ListUsersResponse, crypto,
    db as dbq, service,
};

use super::auth::AdminUser;
use crate::error::ApiErr;
use crate::extract::ApiJson;
use crate::storage::{
    Db, invite_from_row, is_constraint_violation, sq_execute, sq_query_map, user_from_row,
};

/// Codes are 128-bit random; a collision means something is badly wrong.
const INVITE_CODE_ATTEMPTS: usize = 3;

/// GET /api/admin/invites: every invite, newest first.
pub async fn list_invites(
    State(db): State<Db>,
    _admin: AdminUser,
) -> Result<Json<ListInvitesResponse>, ApiErr> {
    let conn = db.conn();
    let invites = sq_query_map(&conn, dbq::invites::list_all(), invite_from_row)
        .map_err(ApiErr::from_db("list invites"))?;
    Ok(Json(ListInvitesResponse { invites }))
}

/// POST /api/admin/invites: issue an invite code bound to an email.
pub async fn create_invite(
    State(db): State<Db>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<CreateInviteRequest>,
) -> Result<(StatusCode, Json<CreateInviteResponse>), ApiErr> {
    let email = service::validate_email(&req.email)?;

    let conn = db.conn();
    for _ in 0..INVITE_CODE_ATTEMPTS {
        let code = crypto::generate_invite_code()?;
        match sq_execute(&conn, dbq::invites::insert(&code, &email, admin.user_id)) {
            Ok(_) => {
                tracing::info!(created_by = admin.user_id, "invite created for {email}");
                return Ok((
                    StatusCode::CREATED,
                    Json(CreateInviteResponse {
                        code,
                        success: true,
                    }),
                ));
            }
            Err(e) if is_constraint_violation(&e) => {
                tracing::warn!("invite code collision, retrying");
            }
            Err(e) => return Err(ApiErr::from_db("insert invite")(e)),
        }
    }
    Err(ApiErr::internal("internal server error"))
}

/// GET /api/admin/users: every user, newest first.
pub async fn list_users(
    State(db): State<Db>,
    _admin: AdminUser,
) -> Result<Json<ListUsersResponse>, ApiErr> {
    let conn = db.conn();
    let users = sq_query_map(&conn, dbq::users::list_all(), user_from_row)
        .map_err(ApiErr::from_db("list users"))?;
    Ok(Json(ListUsersResponse { users }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::AuthUser;
    use crate::storage::test_db;

    fn seed_admin(db: &Db) -> AdminUser {
        let conn = db.conn();
        sq_execute(&conn, dbq::users::insert("admin@example.com", "g-a", "Admin", true)).unwrap();
        AdminUser(AuthUser {
            user_id: conn.last_insert_rowid(),
            is_admin: true,
        })
    }

    #[tokio::test]
    async fn created_invites_are_listed_newest_first() {
        let db = test_db();
        let admin = seed_admin(&db);

        let (status, Json(first)) = create_invite(
            State(db.clone()),
            admin.clone(),
            ApiJson(CreateInviteRequest {
                email: "  First@Example.com ".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(first.success);
        assert_eq!(first.code.len(), 32);

        let (_, Json(second)) = create_invite(
            State(db.clone()),
            admin.clone(),
            ApiJson(CreateInviteRequest {
                email: "second@example.com".into(),
            }),
        )
        .await
        .unwrap();
        assert_ne!(first.code, second.code);

        // Equal created_at timestamps fall back to id order.
        let Json(listed) = list_invites(State(db.clone()), admin).await.unwrap();
        assert_eq!(listed.invites.len(), 2);
        assert_eq!(listed.invites[0].email, "second@example.com");
        assert_eq!(listed.invites[1].email, "first@example.com");
        assert!(!listed.invites[1].used);
        assert_eq!(listed.invites[1].used_by_email, None);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let db = test_db();
        let admin = seed_admin(&db);
        let err = create_invite(
            State(db),
            admin,
            ApiJson(CreateInviteRequest {
                email: "not-an-email".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), service::MSG_INVALID_EMAIL);
    }

    #[tokio::test]
    async fn users_are_listed() {
        let db = test_db();
        let admin = seed_admin(&db);
        {
            let conn = db.conn();
            sq_execute(&conn, dbq::users::insert("m@example.com", "g-m", "M", false)).unwrap();
        }
        let Json(listed) = list_users(State(db), admin).await.unwrap();
        let emails: Vec<_> = listed.users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, ["m@example.com", "admin@example.com"]);
    }
}
