//! Shared API types, crypto, and SQL builders for SalesDesk.
//!
//! This crate is the single source of truth for the JSON request/response
//! shapes exchanged with the dashboard frontend. Wire names are camelCase.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
pub mod oauth;
#[cfg(feature = "backend")]
pub mod service;

// ─── Users ──────────────────────────────────────────────────────────────────

/// A dashboard user as returned to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

/// Response for `GET /api/auth/me`. `user` is `null` when not signed in.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: Option<UserResponse>,
}

/// Response for `GET /api/admin/users`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
}

// ─── Invites ────────────────────────────────────────────────────────────────

/// Second step of the invited sign-up flow.
///
/// Both fields are optional on the wire so that the handler can answer with a
/// precise message instead of a generic deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateInviteRequest {
    #[serde(default)]
    pub invite_code: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// `{ "success": bool, "error"?: string }`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidateInviteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidateInviteResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

/// Request body for `POST /api/admin/invites`.
#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    /// Missing means empty; validation reports it as an invalid address.
    #[serde(default)]
    pub email: String,
}

/// Response for `POST /api/admin/invites`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateInviteResponse {
    pub code: String,
    pub success: bool,
}

/// One row of the admin invite listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    pub id: i64,
    pub code: String,
    pub email: String,
    pub used: bool,
    pub created_at: String,
    pub used_at: Option<String>,
    pub used_by_email: Option<String>,
}

/// Response for `GET /api/admin/invites`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListInvitesResponse {
    pub invites: Vec<InviteSummary>,
}

// ─── Marketplaces ───────────────────────────────────────────────────────────

/// Catalog entry a user can pick a marketplace from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketplaceType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMarketplaceTypesResponse {
    pub marketplace_types: Vec<MarketplaceType>,
}

/// A marketplace owned by the calling user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceResponse {
    pub id: i64,
    pub marketplace_type_id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListMarketplacesResponse {
    pub marketplaces: Vec<MarketplaceResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarketplaceRequest {
    pub marketplace_type_id: i64,
}

// ─── Sales ──────────────────────────────────────────────────────────────────

/// A daily sales figure for one marketplace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SalesEntryResponse {
    pub id: i64,
    pub marketplace_id: i64,
    pub marketplace_name: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub amount: Decimal,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSalesEntriesResponse {
    pub sales_entries: Vec<SalesEntryResponse>,
}

/// Query string for `GET /api/sales`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesEntryFilter {
    pub marketplace_id: Option<i64>,
}

/// Request body for `PUT /api/sales`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSalesEntryRequest {
    pub marketplace_id: i64,
    pub date: String,
    #[serde(default)]
    pub amount: AmountInput,
}

/// A sales amount as submitted: a JSON number, a decimal string, or
/// anything else (rejected when the entry is validated).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

impl Default for AmountInput {
    fn default() -> Self {
        Self::Other(serde_json::Value::Null)
    }
}

/// Aggregates over the caller's sales entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SalesStatistics {
    pub total_sales: Decimal,
    pub month_sales: Decimal,
    pub week_sales: Decimal,
}

// ─── Misc ───────────────────────────────────────────────────────────────────

/// Response for `GET /api/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Generic `{ "ok": true }` acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// ─── Service Error ──────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code. The server converts it into its
/// own error response type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
        }
    }

    /// Build a closure that wraps a DB/IO error as `Internal`.
    pub fn from_db<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| Self::Internal(format!("{context}: {e}"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}
