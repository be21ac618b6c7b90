use anyhow::{Context, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::{Arc, Mutex};

use salesdesk_api::db::{Built, migrations::MIGRATIONS};
use salesdesk_api::service::InviteRecord;
use salesdesk_api::{InviteSummary, MarketplaceResponse, SalesEntryResponse, UserResponse};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("salesdesk.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // WAL for concurrent readers; foreign keys for the sales-entry cascade
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query bindings
// ---------------------------------------------------------------------------

fn to_sql_values(values: &sea_query::Values) -> Vec<Value> {
    values
        .0
        .iter()
        .map(|v| match v {
            sea_query::Value::Bool(Some(b)) => Value::Integer(i64::from(*b)),
            sea_query::Value::TinyInt(Some(i)) => Value::Integer(i64::from(*i)),
            sea_query::Value::SmallInt(Some(i)) => Value::Integer(i64::from(*i)),
            sea_query::Value::Int(Some(i)) => Value::Integer(i64::from(*i)),
            sea_query::Value::BigInt(Some(i)) => Value::Integer(*i),
            sea_query::Value::TinyUnsigned(Some(i)) => Value::Integer(i64::from(*i)),
            sea_query::Value::SmallUnsigned(Some(i)) => Value::Integer(i64::from(*i)),
            sea_query::Value::Unsigned(Some(i)) => Value::Integer(i64::from(*i)),
            sea_query::Value::Float(Some(f)) => Value::Real(f64::from(*f)),
            sea_query::Value::Double(Some(f)) => Value::Real(*f),
            sea_query::Value::String(Some(s)) => Value::Text(s.to_string()),
            sea_query::Value::Bytes(Some(b)) => Value::Blob(b.to_vec()),
            _ => Value::Null,
        })
        .collect()
}

/// Execute a built statement, returning the number of affected rows.
pub fn sq_execute(conn: &Connection, built: Built) -> rusqlite::Result<usize> {
    let (sql, values) = built;
    conn.execute(&sql, rusqlite::params_from_iter(to_sql_values(&values)))
}

/// Run a built query expected to return exactly one row.
pub fn sq_query_row<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    conn.query_row(&sql, rusqlite::params_from_iter(to_sql_values(&values)), f)
}

/// Run a built query and collect every row.
pub fn sq_query_map<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(to_sql_values(&values)), f)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

/// Map user columns starting at `start` (id, email, name, is_admin, created_at).
pub fn user_from_row_at(row: &Row<'_>, start: usize) -> rusqlite::Result<UserResponse> {
    Ok(UserResponse {
        id: row.get(start)?,
        email: row.get(start + 1)?,
        name: row.get(start + 2)?,
        is_admin: row.get(start + 3)?,
        created_at: row.get(start + 4)?,
    })
}

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserResponse> {
    user_from_row_at(row, 0)
}

pub fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<InviteSummary> {
    Ok(InviteSummary {
        id: row.get(0)?,
        code: row.get(1)?,
        email: row.get(2)?,
        used: row.get(3)?,
        created_at: row.get(4)?,
        used_at: row.get(5)?,
        used_by_email: row.get(6)?,
    })
}

/// Columns of [`salesdesk_api::db::invites::lookup_by_code`].
pub fn invite_record_from_row(row: &Row<'_>) -> rusqlite::Result<InviteRecord> {
    Ok(InviteRecord {
        id: row.get(0)?,
        code: row.get(1)?,
        email: row.get(2)?,
        used: row.get(3)?,
    })
}

pub fn marketplace_from_row(row: &Row<'_>) -> rusqlite::Result<MarketplaceResponse> {
    Ok(MarketplaceResponse {
        id: row.get(0)?,
        marketplace_type_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn sales_entry_from_row(row: &Row<'_>) -> rusqlite::Result<SalesEntryResponse> {
    Ok(SalesEntryResponse {
        id: row.get(0)?,
        marketplace_id: row.get(1)?,
        marketplace_name: row.get(2)?,
        date: row.get(3)?,
        amount: decimal_at(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Amounts are stored as exact decimal text ("100.50").
pub fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str_exact(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// True when `err` is a UNIQUE / FOREIGN KEY constraint violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
pub fn test_db() -> Db {
    let dir = tempfile::tempdir().unwrap();
    init_db(&dir.keep()).unwrap()
}
