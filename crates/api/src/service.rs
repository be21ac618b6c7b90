//! Shared business logic as framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters: they load rows, call into here, and
//! write the result back.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{AmountInput, SalesStatistics, ServiceError};

// ─── Messages shown to users ────────────────────────────────────────────────

pub const MSG_INVALID_EMAIL: &str = "Invalid email address";
pub const MSG_INVITE_REQUIRED: &str = "Invite code is required";
pub const MSG_TOKEN_REQUIRED: &str = "Authentication token is required";
pub const MSG_INVITE_NOT_FOUND: &str = "Invalid invite code. Please check the code and try again.";
pub const MSG_INVITE_USED: &str = "This invite code has already been used.";
pub const MSG_INVITE_EMAIL_MISMATCH: &str = "This invite code is not valid for your email address.";
pub const MSG_TRANSFER_EXPIRED: &str = "Your session has expired. Please sign in again.";
pub const MSG_GENERIC_FAILURE: &str = "An error occurred. Please try again.";
pub const MSG_NO_PERMISSION: &str = "You don't have permission to access this resource";
pub const MSG_MARKETPLACE_GONE: &str = "The selected marketplace no longer exists";
pub const MSG_MARKETPLACE_TYPE_MISSING: &str = "The selected marketplace type does not exist";
pub const MSG_MARKETPLACE_DUPLICATE: &str = "You have already added this marketplace";
pub const MSG_FUTURE_DATE: &str = "Sales date cannot be in the future";
pub const MSG_NEGATIVE_AMOUNT: &str = "Sales amount must be non-negative";
pub const MSG_AMOUNT_NOT_NUMBER: &str = "Sales amount must be a valid number";

// ─── Validation ─────────────────────────────────────────────────────────────

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@(?:[A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid = !email.is_empty()
        && email.len() <= 254
        && !email.starts_with('.')
        && !email.contains("..")
        && EMAIL_RE.is_match(&email);
    if !valid {
        return Err(ServiceError::BadRequest(MSG_INVALID_EMAIL.into()));
    }
    Ok(email)
}

/// Trim a user-typed invite code.
pub fn normalize_invite_code(code: &str) -> Result<String, ServiceError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest(MSG_INVITE_REQUIRED.into()));
    }
    Ok(trimmed.to_string())
}

// ─── Invites ────────────────────────────────────────────────────────────────

/// The invite columns needed to decide whether a code can be redeemed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRecord {
    pub id: i64,
    pub code: String,
    pub email: String,
    pub used: bool,
}

/// Decide whether `invite` may be redeemed by `email`.
pub fn check_invite<'a>(
    invite: Option<&'a InviteRecord>,
    email: &str,
) -> Result<&'a InviteRecord, ServiceError> {
    let invite = invite.ok_or_else(|| ServiceError::BadRequest(MSG_INVITE_NOT_FOUND.into()))?;
    if invite.used {
        return Err(ServiceError::BadRequest(MSG_INVITE_USED.into()));
    }
    if !invite.email.trim().eq_ignore_ascii_case(email.trim()) {
        return Err(ServiceError::BadRequest(MSG_INVITE_EMAIL_MISMATCH.into()));
    }
    Ok(invite)
}

// ─── Sessions ───────────────────────────────────────────────────────────────

/// Session lifetime.
pub const SESSION_LIFETIME_DAYS: u64 = 30;
/// Sessions with less than this left are extended on use.
pub const SESSION_RENEW_WITHIN_DAYS: u64 = 15;

/// `Max-Age` for the session cookie, in seconds.
pub const SESSION_COOKIE_MAX_AGE_SECS: u64 = SESSION_LIFETIME_DAYS * 24 * 3600;

const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Expiry for a session issued or renewed at `now`.
pub fn session_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + chrono::Duration::days(SESSION_LIFETIME_DAYS as i64)
}

pub fn session_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}

/// True once the session is inside the renewal window.
pub fn session_needs_renewal(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at - chrono::Duration::days(SESSION_RENEW_WITHIN_DAYS as i64)
}

/// Format a timestamp the way SQLite's `datetime('now')` does (UTC).
pub fn format_sqlite_datetime(dt: DateTime<Utc>) -> String {
    dt.format(SQLITE_DATETIME).to_string()
}

pub fn parse_sqlite_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME)
        .ok()
        .map(|naive| naive.and_utc())
}

// ─── Sales ──────────────────────────────────────────────────────────────────

/// Largest amount a sales entry can hold (eight integer digits, two decimals).
pub fn max_sales_amount() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Parse a `YYYY-MM-DD` sales date and reject dates after `today`.
pub fn validate_sales_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, ServiceError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::BadRequest("Sales date must be a valid date (YYYY-MM-DD)".into())
    })?;
    if date > today {
        return Err(ServiceError::BadRequest(MSG_FUTURE_DATE.into()));
    }
    Ok(date)
}

/// Read a submitted amount as a decimal. Accepts plain and scientific notation.
pub fn parse_sales_amount(input: &AmountInput) -> Result<Decimal, ServiceError> {
    let raw = match input {
        AmountInput::Number(n) => n.to_string(),
        AmountInput::Text(s) => s.trim().to_string(),
        AmountInput::Other(_) => String::new(),
    };
    Decimal::from_str_exact(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| ServiceError::BadRequest(MSG_AMOUNT_NOT_NUMBER.into()))
}

/// Validate a sales amount and normalize it to exactly two decimal places.
pub fn validate_sales_amount(amount: Decimal) -> Result<Decimal, ServiceError> {
    if amount < Decimal::ZERO {
        return Err(ServiceError::BadRequest(MSG_NEGATIVE_AMOUNT.into()));
    }
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    if rounded > max_sales_amount() {
        return Err(ServiceError::BadRequest("Sales amount is too large".into()));
    }
    Ok(rounded)
}

/// First and last day of the Monday–Sunday week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = u64::from(today.weekday().num_days_from_monday());
    let start = today - Days::new(offset);
    (start, start + Days::new(6))
}

/// Sum sales for all time, the current calendar month, and the current week.
pub fn sales_statistics<I>(entries: I, today: NaiveDate) -> SalesStatistics
where
    I: IntoIterator<Item = (NaiveDate, Decimal)>,
{
    let (week_start, week_end) = week_bounds(today);
    let mut stats = SalesStatistics::default();

    for (date, amount) in entries {
        stats.total_sales += amount;
        if date.year() == today.year() && date.month() == today.month() {
            stats.month_sales += amount;
        }
        if date >= week_start && date <= week_end {
            stats.week_sales += amount;
        }
    }

    stats.total_sales.rescale(2);
    stats.month_sales.rescale(2);
    stats.week_sales.rescale(2);
    stats
}
