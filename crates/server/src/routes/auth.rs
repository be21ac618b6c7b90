use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::Deserialize;

use salesdesk_api::{
    MeResponse, ServiceError, UserResponse, ValidateInviteRequest, ValidateInviteResponse,
    crypto::{self, PendingIdentity},
    db as dbq,
    oauth::{self, OAuthProviderConfig, OAuthUserInfo},
    service,
};

use crate::AppState;
use crate::config::AppConfig;
use crate::cookies::{SESSION_COOKIE, STATE_COOKIE, VERIFIER_COOKIE, append_set_cookies, read_cookie};
use crate::error::ApiErr;
use crate::session::{invalidate_session, issue_session, validate_session};
use crate::storage::{
    Db, invite_record_from_row, is_constraint_violation, sq_execute, sq_query_row, user_from_row,
};

// ---------------------------------------------------------------------------
// Auth extractors
// ---------------------------------------------------------------------------

/// Authenticated user extracted from the `session` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub is_admin: bool,
}

impl From<UserResponse> for AuthUser {
    fn from(user: UserResponse) -> Self {
        Self {
            user_id: user.id,
            is_admin: user.is_admin,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Db::from_ref(state);
        current_user(&db, &parts.headers)?
            .map(AuthUser::from)
            .ok_or_else(|| ApiErr::unauthorized("Unauthorized"))
    }
}

/// An [`AuthUser`] with the admin flag set.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Db: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiErr::forbidden("admin access required"));
        }
        Ok(AdminUser(user))
    }
}

/// Resolve the session cookie, if any, to a user.
fn current_user(db: &Db, headers: &HeaderMap) -> Result<Option<UserResponse>, ApiErr> {
    let Some(token) = read_cookie(headers, SESSION_COOKIE) else {
        return Ok(None);
    };
    let conn = db.conn();
    Ok(validate_session(&conn, token, Utc::now())?)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `302 Found` with the given `Set-Cookie` headers.
fn found<I>(location: &str, cookies: I) -> Response
where
    I: IntoIterator<Item = String>,
{
    let Ok(location) = HeaderValue::from_str(location) else {
        tracing::error!("refusing to redirect to invalid location {location:?}");
        return ApiErr::internal("internal server error").into_response();
    };
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, location);
    append_set_cookies(&mut headers, cookies);
    (StatusCode::FOUND, headers).into_response()
}

fn login_error_url(config: &AppConfig, reason: &str) -> String {
    config.url_for(&format!("/login?error={reason}"))
}

fn unix_seconds(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// GET /api/auth/login
// ---------------------------------------------------------------------------

/// GET /api/auth/login: start the Google authorization code flow (PKCE).
pub async fn login(State(config): State<AppConfig>) -> Result<Response, ApiErr> {
    let state = crypto::generate_state_token()?;
    let verifier = crypto::generate_code_verifier()?;
    let url = oauth::build_authorize_url(
        &config.google,
        &config.redirect_uri,
        &state,
        &crypto::code_challenge_s256(&verifier),
    );

    Ok(found(
        &url,
        [
            config.cookies.oauth(STATE_COOKIE, &state),
            config.cookies.oauth(VERIFIER_COOKIE, &verifier),
        ],
    ))
}

// ---------------------------------------------------------------------------
// GET /api/auth/callback/google
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Check the callback query against the OAuth cookies.
///
/// Returns `(code, verifier)` or the `error` value for the login page.
fn check_callback(
    params: &CallbackParams,
    headers: &HeaderMap,
) -> Result<(String, String), &'static str> {
    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or("auth_failed")?;
    let verifier = read_cookie(headers, VERIFIER_COOKIE).ok_or("missing_verifier")?;
    let expected = read_cookie(headers, STATE_COOKIE).ok_or("csrf_validation_failed")?;
    match params.state.as_deref() {
        Some(actual) if actual == expected => Ok((code.to_string(), verifier.to_string())),
        _ => Err("csrf_validation_failed"),
    }
}

/// Exchange the authorization code and fetch the provider profile.
async fn fetch_user_info(
    provider: &OAuthProviderConfig,
    code: &str,
    redirect_uri: &str,
    verifier: &str,
) -> Result<OAuthUserInfo, ServiceError> {
    let client = reqwest::Client::new();

    let token_body = oauth::build_token_request_form_encoded(provider, code, redirect_uri, verifier);
    let raw = client
        .post(&provider.token_url)
        .header("Accept", "application/json")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(token_body)
        .send()
        .await
        .map_err(ServiceError::from_db("token exchange failed"))?
        .text()
        .await
        .map_err(ServiceError::from_db("token response read failed"))?;
    let access_token = oauth::parse_access_token_response(&raw)?;

    let userinfo: serde_json::Value = client
        .get(&provider.userinfo_url)
        .bearer_auth(&access_token)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(ServiceError::from_db("userinfo fetch failed"))?
        .error_for_status()
        .map_err(ServiceError::from_db("userinfo fetch failed"))?
        .json()
        .await
        .map_err(ServiceError::from_db("userinfo parse failed"))?;

    oauth::extract_user_info(provider, &userinfo)
}

#[derive(Debug, PartialEq, Eq)]
enum LoginOutcome {
    /// Signed in; carries the new session token.
    Session(String),
    /// Unknown user; carries a transfer token for invite redemption.
    Invite(String),
}

/// Decide what a verified provider identity gets: a session or an invite prompt.
fn resolve_login(
    db: &Db,
    secret: &[u8],
    info: &OAuthUserInfo,
    now: DateTime<Utc>,
) -> Result<LoginOutcome, ServiceError> {
    let conn = db.conn();

    let existing = sq_query_row(
        &conn,
        dbq::users::get_by_google_id(&info.provider_user_id),
        user_from_row,
    )
    .optional()
    .map_err(ServiceError::from_db("lookup user by google id"))?;
    if let Some(user) = existing {
        tracing::info!(user_id = user.id, "user signed in");
        return Ok(LoginOutcome::Session(issue_session(&conn, user.id, now)?));
    }

    let user_count: i64 = sq_query_row(&conn, dbq::users::count(), |row| row.get(0))
        .map_err(ServiceError::from_db("count users"))?;
    if user_count == 0 {
        let email = info.email.trim().to_lowercase();
        sq_execute(
            &conn,
            dbq::users::insert(&email, &info.provider_user_id, &info.name, true),
        )
        .map_err(ServiceError::from_db("insert first user"))?;
        let user_id = conn.last_insert_rowid();
        tracing::info!(user_id, "first user registered as admin");
        return Ok(LoginOutcome::Session(issue_session(&conn, user_id, now)?));
    }

    let identity = PendingIdentity {
        provider_user_id: info.provider_user_id.clone(),
        email: info.email.clone(),
        name: info.name.clone(),
        picture: info.avatar_url.clone(),
    };
    tracing::info!("unknown user, redirecting to invite entry");
    Ok(LoginOutcome::Invite(crypto::sign_transfer_token(
        &identity,
        secret,
        unix_seconds(now),
    )?))
}

/// GET /api/auth/callback/google: finish sign-in.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let config = &state.config;
    let clear = [
        config.cookies.clear(STATE_COOKIE),
        config.cookies.clear(VERIFIER_COOKIE),
    ];

    let (code, verifier) = match check_callback(&params, &headers) {
        Ok(checked) => checked,
        Err(reason) => {
            tracing::warn!("OAuth callback rejected: {reason}");
            return found(&login_error_url(config, reason), clear);
        }
    };

    // No DB lock is held across these awaits.
    let info = match fetch_user_info(&config.google, &code, &config.redirect_uri, &verifier).await
    {
        Ok(info) => info,
        Err(e) => {
            tracing::error!("Google sign-in failed: {e}");
            return found(&login_error_url(config, "auth_failed"), clear);
        }
    };

    match resolve_login(&state.db, &config.transfer_secret, &info, Utc::now()) {
        Ok(LoginOutcome::Session(token)) => found(
            &config.url_for("/dashboard"),
            clear.into_iter().chain([config.cookies.session(&token)]),
        ),
        Ok(LoginOutcome::Invite(token)) => found(
            &config.url_for(&format!(
                "/invite-entry?token={}",
                urlencoding::encode(&token)
            )),
            clear,
        ),
        Err(e) => {
            tracing::error!("sign-in failed: {e}");
            found(&login_error_url(config, "auth_failed"), clear)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/auth/validate-invite
// ---------------------------------------------------------------------------

const MSG_ACCOUNT_EXISTS: &str = "An account with this email already exists.";

fn generic_failure<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> ApiErr + '_ {
    move |e| {
        tracing::error!("{context}: {e}");
        ApiErr::internal(service::MSG_GENERIC_FAILURE)
    }
}

fn required(value: Option<&str>, msg: &str) -> Result<String, ApiErr> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiErr::bad_request(msg))
}

/// Redeem an invite for the identity in the transfer token.
///
/// User creation, invite consumption, and session creation commit together.
/// Returns the new session token.
fn redeem_invite(
    db: &Db,
    secret: &[u8],
    req: &ValidateInviteRequest,
    now: DateTime<Utc>,
) -> Result<String, ApiErr> {
    let code = required(req.invite_code.as_deref(), service::MSG_INVITE_REQUIRED)?;
    let code = service::normalize_invite_code(&code)?;
    let token = required(req.token.as_deref(), service::MSG_TOKEN_REQUIRED)?;

    let identity = crypto::verify_transfer_token(&token, secret, unix_seconds(now)).map_err(|e| {
        tracing::warn!("transfer token rejected: {e}");
        ApiErr::unauthorized(service::MSG_TRANSFER_EXPIRED)
    })?;

    let mut conn = db.conn();
    let tx = conn
        .transaction()
        .map_err(generic_failure("begin invite transaction"))?;

    let invite = sq_query_row(&tx, dbq::invites::lookup_by_code(&code), invite_record_from_row)
        .optional()
        .map_err(generic_failure("lookup invite"))?;
    let invite = service::check_invite(invite.as_ref(), &identity.email)?;

    let email = identity.email.trim().to_lowercase();
    match sq_execute(
        &tx,
        dbq::users::insert(&email, &identity.provider_user_id, &identity.name, false),
    ) {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => return Err(ApiErr::conflict(MSG_ACCOUNT_EXISTS)),
        Err(e) => return Err(generic_failure("insert invited user")(e)),
    }
    let user_id = tx.last_insert_rowid();

    let used_at = service::format_sqlite_datetime(now);
    let marked = sq_execute(&tx, dbq::invites::mark_used(invite.id, user_id, &used_at))
        .map_err(generic_failure("mark invite used"))?;
    if marked == 0 {
        // Dropping `tx` rolls back the user insert.
        return Err(ApiErr::bad_request(service::MSG_INVITE_USED));
    }

    let session_token = issue_session(&tx, user_id, now).map_err(generic_failure("issue session"))?;
    tx.commit().map_err(generic_failure("commit invite redemption"))?;

    tracing::info!(user_id, invite_id = invite.id, "invite redeemed");
    Ok(session_token)
}

/// POST /api/auth/validate-invite: complete an invited sign-up.
pub async fn validate_invite(
    State(state): State<AppState>,
    body: Result<Json<ValidateInviteRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!("unreadable validate-invite body: {rejection}");
            ValidateInviteRequest::default()
        }
    };

    match redeem_invite(&state.db, &state.config.transfer_secret, &req, Utc::now()) {
        Ok(token) => {
            let mut headers = HeaderMap::new();
            append_set_cookies(&mut headers, [state.config.cookies.session(&token)]);
            (StatusCode::OK, headers, Json(ValidateInviteResponse::ok())).into_response()
        }
        Err(e) => (e.status(), Json(ValidateInviteResponse::failed(e.message()))).into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /api/auth/logout, GET /api/auth/me
// ---------------------------------------------------------------------------

/// POST /api/auth/logout: drop the session and clear the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = read_cookie(&headers, SESSION_COOKIE) {
        let conn = state.db.conn();
        if let Err(e) = invalidate_session(&conn, &crypto::session_id_for(token)) {
            tracing::error!("logout: {e}");
        }
    }
    found(
        &state.config.url_for("/"),
        [state.config.cookies.clear(SESSION_COOKIE)],
    )
}

/// GET /api/auth/me: the signed-in user, or `401 {"user": null}`.
pub async fn me(State(db): State<Db>, headers: HeaderMap) -> Result<Response, ApiErr> {
    Ok(match current_user(&db, &headers)? {
        Some(user) => Json(MeResponse { user: Some(user) }).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(MeResponse { user: None })).into_response(),
    })
}
