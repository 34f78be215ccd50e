use axum::extract::{Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::handlers::Data;
use crate::models::{LicenseKeyView, SubscriberStatus, SubscriberSummary, aggregate};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct SubscriberParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<SubscriberStatus>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default, alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

#[derive(Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// GET /subscribers - per-customer rollup over a snapshot of all keys.
/// Search and status filter apply before paging; the page is cut from the
/// already-sorted aggregate.
pub async fn list_subscribers(
    State(state): State<AppState>,
    Query(params): Query<SubscriberParams>,
) -> Result<Json<Paginated<SubscriberSummary>>> {
    let conn = state.db.get()?;
    let now = Utc::now().timestamp();

    let keys = queries::list_keys(&conn, &state.tables, None)?;
    let mut subscribers = aggregate(&keys, now);

    if let Some(ref needle) = params.search {
        let needle = needle.to_lowercase();
        if !needle.is_empty() {
            subscribers.retain(|s| s.email.to_lowercase().contains(&needle));
        }
    }
    if let Some(status) = params.status {
        subscribers.retain(|s| s.status == status);
    }

    let total = subscribers.len() as i64;
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let total_pages = ((total + page_size - 1) / page_size).max(1);
    let page = params.page.unwrap_or(1).clamp(1, total_pages);

    let start = ((page - 1) * page_size) as usize;
    let data: Vec<SubscriberSummary> = subscribers
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();

    Ok(Json(Paginated {
        data,
        meta: PageMeta {
            total,
            page,
            page_size,
            total_pages,
        },
    }))
}

#[derive(Deserialize)]
pub struct UserPath {
    pub email: String,
}

/// GET /users/{email}/keys - every key owned by one email, newest first.
pub async fn list_keys_for_user(
    State(state): State<AppState>,
    Path(path): Path<UserPath>,
) -> Result<Json<Data<Vec<LicenseKeyView>>>> {
    let conn = state.db.get()?;
    let now = Utc::now().timestamp();
    let keys = queries::list_keys_for_email(&conn, &state.tables, &path.email)?;
    Ok(Json(Data {
        data: keys
            .into_iter()
            .map(|k| LicenseKeyView::new(k, now))
            .collect(),
    }))
}
