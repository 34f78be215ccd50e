use axum::extract::{Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::db::{AppState, queries};
use crate::email::{deal_closed_email, trial_key_email};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::lifecycle;
use crate::models::{
    CreateKey, EditKey, KeyAction, KeyHistoryEntry, LicenseKey, LicenseKeyView,
};

/// Standard success envelope.
#[derive(Serialize)]
pub struct Data<T> {
    pub data: T,
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn view(key: LicenseKey, now: i64) -> LicenseKeyView {
    LicenseKeyView::new(key, now)
}

/// Merge caller-supplied overrides onto a rendered default email; subject
/// and body can each be overridden independently.
fn override_email(
    subject: Option<String>,
    html_body: Option<String>,
    default: (String, String),
) -> (String, String) {
    let (default_subject, default_html) = default;
    (
        subject.unwrap_or(default_subject),
        html_body.unwrap_or(default_html),
    )
}

/// Record an email_sent history entry; like all history, best-effort.
fn record_email_sent(state: &AppState, key_value: &str, email_type: &str, now: i64) {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(key = %key_value, "failed to record email_sent history: {e}");
            return;
        }
    };
    let entry = KeyHistoryEntry {
        id: Uuid::new_v4().to_string(),
        key_value: key_value.to_string(),
        action: KeyAction::EmailSent,
        performed_at: now,
        details: Some(json!({ "email_type": email_type })),
    };
    if let Err(e) = queries::insert_history(&conn, &state.tables, &entry) {
        tracing::warn!(key = %key_value, "failed to record email_sent history: {e}");
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: Option<String>,
}

/// GET /keys - all keys, newest first, with derived status attached.
pub async fn list_keys(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Data<Vec<LicenseKeyView>>>> {
    let conn = state.db.get()?;
    let now = now();
    let keys = queries::list_keys(&conn, &state.tables, params.search.as_deref())?;
    Ok(Json(Data {
        data: keys.into_iter().map(|k| view(k, now)).collect(),
    }))
}

/// POST /keys - issue a new key, optionally mailing it out.
pub async fn create_key(
    State(state): State<AppState>,
    Json(body): Json<CreateKey>,
) -> Result<Json<Data<LicenseKeyView>>> {
    let now = now();
    let key = {
        let conn = state.db.get()?;
        lifecycle::create_key(&conn, &state.tables, &body, now)?
    };

    if body.send_email {
        let (subject, html) = trial_key_email(&key);
        state.email.send_best_effort(&key.email, &subject, &html).await;
        record_email_sent(&state, &key.key, "trial", now);
    }

    Ok(Json(Data {
        data: view(key, now),
    }))
}

#[derive(Deserialize)]
pub struct KeyPath {
    pub key: String,
}

/// GET /keys/{key}
pub async fn get_key(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
) -> Result<Json<Data<LicenseKeyView>>> {
    let conn = state.db.get()?;
    let now = now();
    let key = queries::get_key(&conn, &state.tables, &path.key)?
        .ok_or_else(|| AppError::NotFound("License key not found".into()))?;
    Ok(Json(Data {
        data: view(key, now),
    }))
}

/// GET /keys/{key}/history - audit trail, newest first.
///
/// History outlives keys (no cascading delete), so this intentionally
/// doesn't 404 on an unknown key value; it just returns what exists.
pub async fn key_history(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
) -> Result<Json<Data<Vec<KeyHistoryEntry>>>> {
    let conn = state.db.get()?;
    let entries = queries::list_history(&conn, &state.tables, &path.key)?;
    Ok(Json(Data { data: entries }))
}

#[derive(Deserialize)]
pub struct ExtendBody {
    pub additional_days: i64,
}

/// POST /keys/{key}/extend
pub async fn extend_key(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
    Json(body): Json<ExtendBody>,
) -> Result<Json<Data<LicenseKeyView>>> {
    let conn = state.db.get()?;
    let now = now();
    let key = lifecycle::extend_key(&conn, &state.tables, &path.key, body.additional_days, now)?;
    Ok(Json(Data {
        data: view(key, now),
    }))
}

/// POST /keys/{key}/disable
pub async fn disable_key(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
) -> Result<Json<Data<LicenseKeyView>>> {
    let conn = state.db.get()?;
    let now = now();
    let key = lifecycle::disable_key(&conn, &state.tables, &path.key, now)?;
    Ok(Json(Data {
        data: view(key, now),
    }))
}

#[derive(Default, Deserialize)]
pub struct ReactivateBody {
    #[serde(default)]
    pub days: Option<i64>,
}

/// POST /keys/{key}/reactivate - body is optional.
pub async fn reactivate_key(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
    body: Option<Json<ReactivateBody>>,
) -> Result<Json<Data<LicenseKeyView>>> {
    let days = body.and_then(|Json(b)| b.days);
    let conn = state.db.get()?;
    let now = now();
    let key = lifecycle::reactivate_key(&conn, &state.tables, &path.key, days, now)?;
    Ok(Json(Data {
        data: view(key, now),
    }))
}

/// The dashboard sends this body in camelCase; scripts tend to use
/// snake_case. Both are accepted.
#[derive(Deserialize)]
pub struct DealClosedBody {
    #[serde(alias = "activeFlows")]
    pub active_flows: i64,
    /// Defaults to true: closing a deal normally mails the customer
    #[serde(default = "default_send_email", alias = "sendEmail")]
    pub send_email: bool,
    /// Optional override of the rendered email
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "htmlBody")]
    pub html_body: Option<String>,
}

fn default_send_email() -> bool {
    true
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedKeys {
    pub development_key: LicenseKeyView,
    pub production_key: LicenseKeyView,
}

/// POST /keys/{key}/deal-closed - convert the trial, issue the production
/// sibling, then mail both keys (best-effort; the conversion stands even
/// if the relay is down).
pub async fn deal_closed(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
    Json(body): Json<DealClosedBody>,
) -> Result<Json<Data<ConvertedKeys>>> {
    let now = now();
    let (development, production) = {
        let conn = state.db.get()?;
        lifecycle::convert_deal_closed(&conn, &state.tables, &path.key, body.active_flows, now)?
    };

    if body.send_email {
        let (subject, html) = override_email(
            body.subject,
            body.html_body,
            deal_closed_email(&development, &production, body.active_flows),
        );
        state
            .email
            .send_best_effort(&production.email, &subject, &html)
            .await;
        record_email_sent(&state, &development.key, "deal_closed", now);
    }

    Ok(Json(Data {
        data: ConvertedKeys {
            development_key: view(development, now),
            production_key: view(production, now),
        },
    }))
}

#[derive(Serialize)]
pub struct EditResponse {
    pub success: bool,
    pub data: LicenseKeyView,
}

/// PUT /keys/{key}/edit - partial update, caller owns consistency.
pub async fn edit_key(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
    Json(body): Json<EditKey>,
) -> Result<Json<EditResponse>> {
    let conn = state.db.get()?;
    let now = now();
    let key = lifecycle::edit_key(&conn, &state.tables, &path.key, &body, now)?;
    Ok(Json(EditResponse {
        success: true,
        data: view(key, now),
    }))
}

#[derive(Default, Deserialize)]
pub struct SendEmailBody {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "htmlBody")]
    pub html_body: Option<String>,
}

/// POST /keys/{key}/send-email - explicit send; unlike lifecycle side
/// effects this one reports relay failure to the caller.
pub async fn send_key_email(
    State(state): State<AppState>,
    Path(path): Path<KeyPath>,
    body: Option<Json<SendEmailBody>>,
) -> Result<Json<Data<serde_json::Value>>> {
    let now = now();
    let key = {
        let conn = state.db.get()?;
        queries::get_key(&conn, &state.tables, &path.key)?
            .ok_or_else(|| AppError::NotFound("License key not found".into()))?
    };

    let body = body.map(|Json(b)| b).unwrap_or_default();
    let (subject, html) = override_email(body.subject, body.html_body, trial_key_email(&key));

    state.email.send(&key.email, &subject, &html).await?;
    record_email_sent(&state, &key.key, "trial", now);

    Ok(Json(Data {
        data: json!({ "sent": true }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_email() -> (String, String) {
        ("Default subject".to_string(), "<p>default</p>".to_string())
    }

    #[test]
    fn email_override_applies_each_part_independently() {
        let (subject, html) = override_email(None, None, default_email());
        assert_eq!(subject, "Default subject");
        assert_eq!(html, "<p>default</p>");

        let (subject, html) =
            override_email(Some("Custom".to_string()), None, default_email());
        assert_eq!(subject, "Custom");
        assert_eq!(html, "<p>default</p>");

        let (subject, html) =
            override_email(None, Some("<p>custom</p>".to_string()), default_email());
        assert_eq!(subject, "Default subject");
        assert_eq!(html, "<p>custom</p>");

        let (subject, html) = override_email(
            Some("Custom".to_string()),
            Some("<p>custom</p>".to_string()),
            default_email(),
        );
        assert_eq!(subject, "Custom");
        assert_eq!(html, "<p>custom</p>");
    }
}
