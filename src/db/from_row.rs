//! Row -> model mapping shared by all queries, with the column lists kept
//! next to the implementations so SELECTs and field order can't drift apart.

use rusqlite::types::Type;
use rusqlite::{Connection, Params, Row};

use crate::error::Result;
use crate::models::{KeyHistoryEntry, LicenseKey};

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

pub const LICENSE_KEY_COLS: &str = "key, email, key_type, is_trial, created_at, activated_at, \
     expires_at, active_flows, features, full_name, company_name, number_of_employees, goal, notes";

pub const KEY_HISTORY_COLS: &str = "id, key_value, action, performed_at, details";

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl FromRow for LicenseKey {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let features: String = row.get(8)?;
        let features = serde_json::from_str(&features)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

        Ok(LicenseKey {
            key: row.get(0)?,
            email: row.get(1)?,
            key_type: parse_text(row, 2)?,
            is_trial: row.get(3)?,
            created_at: row.get(4)?,
            activated_at: row.get(5)?,
            expires_at: row.get(6)?,
            active_flows: row.get(7)?,
            features,
            full_name: row.get(9)?,
            company_name: row.get(10)?,
            number_of_employees: row.get(11)?,
            goal: row.get(12)?,
            notes: row.get(13)?,
        })
    }
}

impl FromRow for KeyHistoryEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let details: Option<String> = row.get(4)?;
        Ok(KeyHistoryEntry {
            id: row.get(0)?,
            key_value: row.get(1)?,
            action: parse_text(row, 2)?,
            performed_at: row.get(3)?,
            details: details.and_then(|s| serde_json::from_str(&s).ok()),
        })
    }
}

pub fn query_one<T: FromRow, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, |row| T::from_row(row))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
