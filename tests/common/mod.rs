//! Shared helpers for integration tests: in-memory database pools and a
//! ready-to-route application state.

#![allow(dead_code)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use keyhaus::db::{AppState, DbPool, Tables, init_db};
use keyhaus::email::EmailService;
use keyhaus::lifecycle;
use keyhaus::models::{CreateKey, KeyProfile, LicenseKey};

pub const DAY: i64 = 86400;
/// 2024-01-01T12:00:00Z
pub const JAN1: i64 = 1_704_110_400;

/// Single-connection pool so every borrow sees the same in-memory database.
pub fn test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn, &Tables::default()).unwrap();
    }
    pool
}

pub fn test_state() -> AppState {
    AppState {
        db: test_pool(),
        tables: Tables::default(),
        email: EmailService::new(None, "test@example.com".to_string()),
        admin_token: None,
        dev_mode: true,
    }
}

pub fn create_input(email: &str, valid_days: Option<i64>) -> CreateKey {
    CreateKey {
        email: email.to_string(),
        valid_days,
        preset: None,
        features: None,
        active_flows: None,
        profile: KeyProfile::default(),
        send_email: false,
    }
}

pub fn create_trial(state: &AppState, email: &str, valid_days: i64, now: i64) -> LicenseKey {
    let conn = state.db.get().unwrap();
    lifecycle::create_key(&conn, &state.tables, &create_input(email, Some(valid_days)), now)
        .unwrap()
}

pub fn create_subscribed(state: &AppState, email: &str, now: i64) -> LicenseKey {
    let conn = state.db.get().unwrap();
    lifecycle::create_key(&conn, &state.tables, &create_input(email, None), now).unwrap()
}
