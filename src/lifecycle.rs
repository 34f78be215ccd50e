//! Key lifecycle engine: the transition rules for create, extend, disable,
//! reactivate, deal-closed conversion, and generic edit.
//!
//! Every operation takes an explicit `now` so the clock stays in the
//! caller's hands, validates before touching storage, persists, and then
//! appends a history entry. History is diagnostic, not authoritative: a
//! failed append is logged and never fails the operation that triggered it.

use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::db::{Tables, queries};
use crate::error::{AppError, Result};
use crate::keygen::generate_key;
use crate::models::{CreateKey, EditKey, FeatureFlags, KeyAction, KeyHistoryEntry, KeyType, LicenseKey};
use crate::status::utc_day_start;

const SECONDS_PER_DAY: i64 = 86400;

/// Default reactivation window for trial keys when no day count is given.
const DEFAULT_TRIAL_REACTIVATION_DAYS: i64 = 7;

/// Append an audit entry, logging instead of propagating on failure.
fn record_history(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    action: KeyAction,
    details: serde_json::Value,
    now: i64,
) {
    let entry = KeyHistoryEntry {
        id: Uuid::new_v4().to_string(),
        key_value: key_value.to_string(),
        action,
        performed_at: now,
        details: Some(details),
    };
    if let Err(e) = queries::insert_history(conn, tables, &entry) {
        tracing::warn!(
            key = %key_value,
            action = action.as_ref(),
            "failed to record key history: {e}"
        );
    }
}

fn fetch_key(conn: &Connection, tables: &Tables, key_value: &str) -> Result<LicenseKey> {
    queries::get_key(conn, tables, key_value)?
        .ok_or_else(|| AppError::NotFound("License key not found".into()))
}

/// Issue a new key.
///
/// `valid_days` present makes a trial development key expiring that many
/// days out; absent makes a subscribed production key with no expiry.
pub fn create_key(
    conn: &Connection,
    tables: &Tables,
    input: &CreateKey,
    now: i64,
) -> Result<LicenseKey> {
    let email = input.email.trim();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".into()));
    }
    if let Some(days) = input.valid_days {
        if days <= 0 {
            return Err(AppError::BadRequest("valid_days must be positive".into()));
        }
    }

    let preset = input.preset.unwrap_or_default();
    let mut features = FeatureFlags::preset(preset);
    if let Some(ref overrides) = input.features {
        features = overrides.apply_to(features);
    }

    let (key_type, is_trial, expires_at) = match input.valid_days {
        Some(days) => (KeyType::Development, true, Some(now + days * SECONDS_PER_DAY)),
        None => (KeyType::Production, false, None),
    };

    let key = LicenseKey {
        key: generate_key(),
        email: email.to_string(),
        key_type,
        is_trial,
        created_at: now,
        activated_at: Some(now),
        expires_at,
        active_flows: input.active_flows,
        features,
        full_name: input.profile.full_name.clone(),
        company_name: input.profile.company_name.clone(),
        number_of_employees: input.profile.number_of_employees.clone(),
        goal: input.profile.goal.clone(),
        notes: input.profile.notes.clone(),
    };

    queries::insert_key(conn, tables, &key)?;
    record_history(
        conn,
        tables,
        &key.key,
        KeyAction::Created,
        json!({
            "valid_days": input.valid_days,
            "preset": preset.as_ref(),
            "key_type": key.key_type.as_ref(),
        }),
        now,
    );

    tracing::info!(key = %key.key, email = %key.email, "license key created");
    Ok(key)
}

/// Push a key's expiry out by `additional_days`.
///
/// The base date is max(current expiry, now): a key that already expired is
/// extended from today, never from its stale past expiry, so the result is
/// always in the future. Calls compound; nothing about this is idempotent.
pub fn extend_key(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    additional_days: i64,
    now: i64,
) -> Result<LicenseKey> {
    if additional_days <= 0 {
        return Err(AppError::BadRequest("Invalid additional_days value".into()));
    }

    let mut key = fetch_key(conn, tables, key_value)?;

    let base = key.expires_at.unwrap_or(now).max(now);
    let new_expiry = base + additional_days * SECONDS_PER_DAY;

    queries::update_renewal(conn, tables, key_value, Some(new_expiry), now)?;
    record_history(
        conn,
        tables,
        key_value,
        KeyAction::Extended,
        json!({ "additional_days": additional_days, "new_expiry": new_expiry }),
        now,
    );

    key.expires_at = Some(new_expiry);
    key.activated_at = Some(now);
    Ok(key)
}

/// Administratively disable a key by stamping its expiry to UTC-midnight
/// today, overwriting any prior value (including a perpetual None).
///
/// Known ambiguity preserved from the source: a key that naturally expires
/// today is indistinguishable from one disabled today.
pub fn disable_key(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    now: i64,
) -> Result<LicenseKey> {
    let mut key = fetch_key(conn, tables, key_value)?;

    let marker = utc_day_start(now);
    queries::update_expiry(conn, tables, key_value, Some(marker))?;
    record_history(
        conn,
        tables,
        key_value,
        KeyAction::Disabled,
        json!({}),
        now,
    );

    key.expires_at = Some(marker);
    Ok(key)
}

/// Bring a disabled or expired key back.
///
/// Trials get a fresh window (`days` if positive, else 7); subscribed keys
/// simply lose their disable marker (`days` is ignored for them). Either
/// way the activation timestamp is refreshed.
pub fn reactivate_key(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    days: Option<i64>,
    now: i64,
) -> Result<LicenseKey> {
    let mut key = fetch_key(conn, tables, key_value)?;

    let new_expiry = if key.is_trial {
        let days = days
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_TRIAL_REACTIVATION_DAYS);
        Some(now + days * SECONDS_PER_DAY)
    } else {
        None
    };

    queries::update_renewal(conn, tables, key_value, new_expiry, now)?;
    record_history(
        conn,
        tables,
        key_value,
        KeyAction::Reactivated,
        json!({
            "new_expiry": new_expiry,
            "key_type": key.key_type.as_ref(),
            "was_trial": key.is_trial,
        }),
        now,
    );

    key.expires_at = new_expiry;
    key.activated_at = Some(now);
    Ok(key)
}

/// Convert a trial into a paid relationship: the trial key becomes a
/// perpetual development key and a brand-new production key is issued
/// alongside it, cloning feature flags and profile fields.
///
/// Explicitly two-phase. Phase one (the in-place conversion) commits with a
/// `deal_closed` history entry before phase two (the production insert)
/// runs, so a failure in between leaves a detectable, reportable state
/// rather than a silent one; that state is surfaced as
/// `ConversionIncomplete`, never as a generic failure.
pub fn convert_deal_closed(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    active_flows: i64,
    now: i64,
) -> Result<(LicenseKey, LicenseKey)> {
    if active_flows <= 0 {
        return Err(AppError::BadRequest("Invalid active_flows value".into()));
    }

    let trial = fetch_key(conn, tables, key_value)?;

    // Phase one: mutate the trial key in place into a development key.
    let mut development = trial.clone();
    development.key_type = KeyType::Development;
    development.is_trial = false;
    development.expires_at = None;
    development.activated_at = Some(now);
    development.active_flows = Some(active_flows);

    queries::convert_to_development(conn, tables, key_value, now, Some(active_flows))?;
    record_history(
        conn,
        tables,
        key_value,
        KeyAction::DealClosed,
        json!({ "converted_to": "development", "active_flows": active_flows }),
        now,
    );

    // Phase two: issue the production sibling. If this fails the trial key
    // has already been converted, and the caller must be told exactly that.
    let production = LicenseKey {
        key: generate_key(),
        email: trial.email.clone(),
        key_type: KeyType::Production,
        is_trial: false,
        created_at: now,
        activated_at: Some(now),
        expires_at: None,
        active_flows: Some(active_flows),
        features: trial.features,
        full_name: trial.full_name.clone(),
        company_name: trial.company_name.clone(),
        number_of_employees: trial.number_of_employees.clone(),
        goal: trial.goal.clone(),
        notes: trial.notes.clone(),
    };

    queries::insert_key(conn, tables, &production).map_err(|e| {
        tracing::error!(
            key = %key_value,
            "production key insert failed after trial conversion: {e}"
        );
        AppError::ConversionIncomplete(key_value.to_string())
    })?;
    record_history(
        conn,
        tables,
        &production.key,
        KeyAction::Created,
        json!({
            "key_type": "production",
            "active_flows": active_flows,
            "related_development_key": key_value,
        }),
        now,
    );

    tracing::info!(
        development = %development.key,
        production = %production.key,
        "deal closed"
    );
    Ok((development, production))
}

/// Generic partial update. No cross-field invariant repair happens here;
/// the caller owns consistency (matching the original tool).
pub fn edit_key(
    conn: &Connection,
    tables: &Tables,
    key_value: &str,
    edit: &EditKey,
    now: i64,
) -> Result<LicenseKey> {
    if edit.is_empty() {
        return Err(AppError::BadRequest("No fields to update".into()));
    }

    let current = fetch_key(conn, tables, key_value)?;
    queries::apply_edit(conn, tables, &current, edit)?;

    record_history(
        conn,
        tables,
        key_value,
        KeyAction::Updated,
        json!({ "updated_fields": edited_field_names(edit) }),
        now,
    );

    fetch_key(conn, tables, key_value)
}

fn edited_field_names(edit: &EditKey) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if edit.email.is_some() {
        fields.push("email");
    }
    if edit.key_type.is_some() {
        fields.push("key_type");
    }
    if edit.is_trial.is_some() {
        fields.push("is_trial");
    }
    if edit.expires_at.is_some() {
        fields.push("expires_at");
    }
    if edit.activated_at.is_some() {
        fields.push("activated_at");
    }
    if edit.active_flows.is_some() {
        fields.push("active_flows");
    }
    if edit.features.as_ref().is_some_and(|f| !f.is_empty()) {
        fields.push("features");
    }
    if edit.full_name.is_some() {
        fields.push("full_name");
    }
    if edit.company_name.is_some() {
        fields.push("company_name");
    }
    if edit.number_of_employees.is_some() {
        fields.push("number_of_employees");
    }
    if edit.goal.is_some() {
        fields.push("goal");
    }
    if edit.notes.is_some() {
        fields.push("notes");
    }
    fields
}
