use rusqlite::{Connection, params, types::Value};

use crate::error::Result;
use crate::models::{EditKey, KeyHistoryEntry, KeyType, LicenseKey};

use super::Tables;
use super::from_row::{KEY_HISTORY_COLS, LICENSE_KEY_COLS, query_all, query_one};

/// Builder for dynamic UPDATE statements with optional fields, keyed by the
/// license key value (the table's primary identifier).
struct UpdateBuilder {
    table: String,
    key: String,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &str, key: &str) -> Self {
        Self {
            table: table.to_string(),
            key: key.to_string(),
            fields: Vec::new(),
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to an explicit value (including NULL).
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    /// Returns false when there was nothing to update or no row matched.
    fn execute(self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.key.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE key = ?",
            self.table,
            sets.join(", ")
        );
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ License keys ============

pub fn insert_key(conn: &Connection, tables: &Tables, key: &LicenseKey) -> Result<()> {
    let features_json = serde_json::to_string(&key.features)?;
    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            tables.license_keys, LICENSE_KEY_COLS
        ),
        params![
            &key.key,
            &key.email,
            key.key_type.as_ref(),
            key.is_trial,
            key.created_at,
            key.activated_at,
            key.expires_at,
            key.active_flows,
            &features_json,
            &key.full_name,
            &key.company_name,
            &key.number_of_employees,
            &key.goal,
            &key.notes,
        ],
    )?;
    Ok(())
}

pub fn get_key(conn: &Connection, tables: &Tables, key_value: &str) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE key = ?1",
            LICENSE_KEY_COLS, tables.license_keys
        ),
        &[&key_value],
    )
}

/// All keys, newest first, optionally filtered by an email substring
/// (case-insensitive, matching the old dashboard's ilike search).
pub fn list_keys(
    conn: &Connection,
    tables: &Tables,
    search: Option<&str>,
) -> Result<Vec<LicenseKey>> {
    match search {
        Some(needle) if !needle.is_empty() => query_all(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE email LIKE ?1 ORDER BY created_at DESC",
                LICENSE_KEY_COLS, tables.license_keys
            ),
            &[&format!("%{}%", needle)],
        ),
        _ => query_all(
            conn,
            &format!(
                "SELECT {} FROM {} ORDER BY created_at DESC",
                LICENSE_KEY_COLS, tables.license_keys
            ),
            [],
        ),
    }
}

/// All keys owned by one email (exact match), newest first.
pub fn list_keys_for_email(
    conn: &Connection,
    tables: &Tables,
    email: &str,
) -> Result<Vec<LicenseKey>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE email = ?1 ORDER BY created_at DESC",
            LICENSE_KEY_COLS, tables.license_keys
        ),
        &[&email],
    )
}

/// Overwrite a key's expiry (including clearing it).
pub fn update_expiry(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    expires_at: Option<i64>,
) -> Result<bool> {
    UpdateBuilder::new(&tables.license_keys, key_value)
        .set_nullable("expires_at", expires_at)
        .execute(conn)
}

/// Expiry plus a fresh activation timestamp (extend/reactivate).
pub fn update_renewal(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    expires_at: Option<i64>,
    activated_at: i64,
) -> Result<bool> {
    UpdateBuilder::new(&tables.license_keys, key_value)
        .set_nullable("expires_at", expires_at)
        .set("activated_at", activated_at)
        .execute(conn)
}

/// Phase one of deal-closed: the trial key becomes a perpetual
/// development key carrying the agreed usage limit.
pub fn convert_to_development(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    activated_at: i64,
    active_flows: Option<i64>,
) -> Result<bool> {
    UpdateBuilder::new(&tables.license_keys, key_value)
        .set("key_type", KeyType::Development.as_ref().to_string())
        .set("is_trial", false)
        .set_nullable("expires_at", None::<i64>)
        .set("activated_at", activated_at)
        .set_nullable("active_flows", active_flows)
        .execute(conn)
}

/// Apply a partial edit. The caller has already rejected empty edits;
/// feature overrides are merged onto `current` and stored whole.
pub fn apply_edit(
    conn: &Connection,
    tables: &Tables,
    current: &LicenseKey,
    edit: &EditKey,
) -> Result<bool> {
    let mut builder = UpdateBuilder::new(&tables.license_keys, &current.key)
        .set_opt("email", edit.email.clone())
        .set_opt("key_type", edit.key_type.map(|t| t.as_ref().to_string()))
        .set_opt("is_trial", edit.is_trial);

    if let Some(expires_at) = edit.expires_at {
        builder = builder.set_nullable("expires_at", expires_at);
    }
    if let Some(activated_at) = edit.activated_at {
        builder = builder.set_nullable("activated_at", activated_at);
    }
    if let Some(active_flows) = edit.active_flows {
        builder = builder.set_nullable("active_flows", active_flows);
    }
    if let Some(ref overrides) = edit.features {
        if !overrides.is_empty() {
            let merged = overrides.apply_to(current.features);
            builder = builder.set("features", serde_json::to_string(&merged)?);
        }
    }
    if let Some(ref full_name) = edit.full_name {
        builder = builder.set_nullable("full_name", full_name.clone());
    }
    if let Some(ref company_name) = edit.company_name {
        builder = builder.set_nullable("company_name", company_name.clone());
    }
    if let Some(ref number_of_employees) = edit.number_of_employees {
        builder = builder.set_nullable("number_of_employees", number_of_employees.clone());
    }
    if let Some(ref goal) = edit.goal {
        builder = builder.set_nullable("goal", goal.clone());
    }
    if let Some(ref notes) = edit.notes {
        builder = builder.set_nullable("notes", notes.clone());
    }

    builder.execute(conn)
}

// ============ Key history ============

pub fn insert_history(conn: &Connection, tables: &Tables, entry: &KeyHistoryEntry) -> Result<()> {
    let details = entry.details.as_ref().map(|d| d.to_string());
    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
            tables.key_history, KEY_HISTORY_COLS
        ),
        params![
            &entry.id,
            &entry.key_value,
            entry.action.as_ref(),
            entry.performed_at,
            details,
        ],
    )?;
    Ok(())
}

/// Newest first; rowid breaks ties so entries recorded within the same
/// second keep their insertion order.
pub fn list_history(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
) -> Result<Vec<KeyHistoryEntry>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE key_value = ?1 ORDER BY performed_at DESC, rowid DESC",
            KEY_HISTORY_COLS, tables.key_history
        ),
        &[&key_value],
    )
}
