//! Lifecycle engine tests: transition rules, field computation, history.

mod common;
use common::*;

use keyhaus::db::queries;
use keyhaus::error::AppError;
use keyhaus::lifecycle;
use keyhaus::models::{EditKey, FeaturePreset, KeyAction, KeyType};
use keyhaus::status::{KeyStatus, derive_status, utc_day_start};

// ============ create ============

#[test]
fn create_with_valid_days_is_trial_development() {
    let state = test_state();
    let key = create_trial(&state, "trial@example.com", 14, JAN1);

    assert!(key.key.starts_with("LK-"));
    assert_eq!(key.key_type, KeyType::Development);
    assert!(key.is_trial);
    assert_eq!(key.expires_at, Some(JAN1 + 14 * DAY));
    assert_eq!(key.activated_at, Some(JAN1));
    assert_eq!(key.created_at, JAN1);
    assert_eq!(key.status(JAN1), KeyStatus::Active);
}

#[test]
fn create_without_valid_days_is_subscribed_production() {
    let state = test_state();
    let key = create_subscribed(&state, "paid@example.com", JAN1);

    assert_eq!(key.key_type, KeyType::Production);
    assert!(!key.is_trial);
    assert_eq!(key.expires_at, None);
    assert_eq!(key.status(JAN1), KeyStatus::Active);
}

#[test]
fn create_rejects_missing_email() {
    let state = test_state();
    let conn = state.db.get().unwrap();
    let err = lifecycle::create_key(&conn, &state.tables, &create_input("  ", Some(14)), JAN1)
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn create_rejects_non_positive_valid_days() {
    let state = test_state();
    let conn = state.db.get().unwrap();
    let err = lifecycle::create_key(&conn, &state.tables, &create_input("a@b.c", Some(0)), JAN1)
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn create_applies_preset_and_overrides() {
    let state = test_state();
    let conn = state.db.get().unwrap();

    let mut input = create_input("preset@example.com", Some(14));
    input.preset = Some(FeaturePreset::Minimal);
    let mut overrides = keyhaus::models::FeatureOverrides::default();
    overrides.sso_enabled = Some(true);
    input.features = Some(overrides);

    let key = lifecycle::create_key(&conn, &state.tables, &input, JAN1).unwrap();
    assert!(key.features.sso_enabled, "override wins");
    assert!(key.features.show_powered_by, "preset default kept");
    assert!(!key.features.embedding_enabled);

    // Round-trips through storage
    let stored = queries::get_key(&conn, &state.tables, &key.key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.features, key.features);
}

#[test]
fn generated_keys_are_unique_per_create() {
    let state = test_state();
    let a = create_trial(&state, "a@example.com", 14, JAN1);
    let b = create_trial(&state, "a@example.com", 14, JAN1);
    assert_ne!(a.key, b.key);
}

// ============ extend ============

#[test]
fn extend_adds_days_to_future_expiry() {
    let state = test_state();
    let key = create_trial(&state, "t@example.com", 14, JAN1);

    let conn = state.db.get().unwrap();
    // Day 10: expiry is still in the future, so extension builds on it
    let now = JAN1 + 9 * DAY;
    let updated = lifecycle::extend_key(&conn, &state.tables, &key.key, 7, now).unwrap();
    assert_eq!(updated.expires_at, Some(JAN1 + 21 * DAY));
    assert_eq!(updated.activated_at, Some(now));
}

#[test]
fn extend_from_expired_key_starts_at_now() {
    let state = test_state();
    let key = create_trial(&state, "t@example.com", 14, JAN1);

    let conn = state.db.get().unwrap();
    // Far past expiry: the stale date must not be the base
    let now = JAN1 + 100 * DAY;
    let updated = lifecycle::extend_key(&conn, &state.tables, &key.key, 7, now).unwrap();
    assert_eq!(updated.expires_at, Some(now + 7 * DAY));
    assert!(updated.expires_at.unwrap() >= now, "extend never lands in the past");
    assert_eq!(updated.status(now), KeyStatus::Active);
}

#[test]
fn extend_perpetual_key_counts_from_now() {
    let state = test_state();
    let key = create_subscribed(&state, "p@example.com", JAN1);

    let conn = state.db.get().unwrap();
    let updated = lifecycle::extend_key(&conn, &state.tables, &key.key, 30, JAN1).unwrap();
    assert_eq!(updated.expires_at, Some(JAN1 + 30 * DAY));
}

#[test]
fn extend_compounds_across_calls() {
    let state = test_state();
    let key = create_trial(&state, "t@example.com", 14, JAN1);

    let conn = state.db.get().unwrap();
    lifecycle::extend_key(&conn, &state.tables, &key.key, 7, JAN1).unwrap();
    let updated = lifecycle::extend_key(&conn, &state.tables, &key.key, 7, JAN1).unwrap();
    assert_eq!(updated.expires_at, Some(JAN1 + 28 * DAY));
}

#[test]
fn extend_rejects_non_positive_days() {
    let state = test_state();
    let key = create_trial(&state, "t@example.com", 14, JAN1);

    let conn = state.db.get().unwrap();
    for days in [0, -5] {
        let err = lifecycle::extend_key(&conn, &state.tables, &key.key, days, JAN1).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

#[test]
fn extend_unknown_key_is_not_found() {
    let state = test_state();
    let conn = state.db.get().unwrap();
    let err = lifecycle::extend_key(&conn, &state.tables, "LK-NOPE-NOPE-NOPE-NOPE", 7, JAN1)
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============ disable ============

#[test]
fn disable_stamps_today_regardless_of_prior_expiry() {
    let state = test_state();

    // Seed before borrowing the pool's single connection
    let future = create_trial(&state, "f@example.com", 14, JAN1);
    let expired = create_trial(&state, "e@example.com", 1, JAN1 - 30 * DAY);
    let perpetual = create_subscribed(&state, "p@example.com", JAN1);

    let conn = state.db.get().unwrap();
    for key in [&future, &expired, &perpetual] {
        let updated = lifecycle::disable_key(&conn, &state.tables, &key.key, JAN1).unwrap();
        assert_eq!(updated.expires_at, Some(utc_day_start(JAN1)));
        assert_eq!(updated.status(JAN1), KeyStatus::Disabled);
    }
}

// ============ reactivate ============

#[test]
fn reactivate_trial_uses_given_days() {
    let state = test_state();
    let key = create_trial(&state, "t@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    lifecycle::disable_key(&conn, &state.tables, &key.key, JAN1).unwrap();
    let now = JAN1 + DAY;
    let updated =
        lifecycle::reactivate_key(&conn, &state.tables, &key.key, Some(30), now).unwrap();
    assert_eq!(updated.expires_at, Some(now + 30 * DAY));
    assert_eq!(updated.activated_at, Some(now));
    assert_eq!(updated.status(now), KeyStatus::Active);
}

#[test]
fn reactivate_trial_defaults_to_seven_days() {
    let state = test_state();
    let key = create_trial(&state, "t@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    for days in [None, Some(0), Some(-3)] {
        let updated =
            lifecycle::reactivate_key(&conn, &state.tables, &key.key, days, JAN1).unwrap();
        assert_eq!(updated.expires_at, Some(JAN1 + 7 * DAY), "days={days:?}");
    }
}

#[test]
fn reactivate_subscribed_clears_expiry_and_ignores_days() {
    let state = test_state();
    let key = create_subscribed(&state, "p@example.com", JAN1);
    let conn = state.db.get().unwrap();

    lifecycle::disable_key(&conn, &state.tables, &key.key, JAN1).unwrap();
    let updated =
        lifecycle::reactivate_key(&conn, &state.tables, &key.key, Some(90), JAN1).unwrap();
    assert_eq!(updated.expires_at, None);
    assert_eq!(updated.status(JAN1), KeyStatus::Active);
}

// ============ deal-closed conversion ============

#[test]
fn convert_produces_two_distinct_perpetual_keys() {
    let state = test_state();
    let key = create_trial(&state, "deal@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    let (development, production) =
        lifecycle::convert_deal_closed(&conn, &state.tables, &key.key, 1000, JAN1).unwrap();

    assert_eq!(development.key, key.key, "trial key mutated in place");
    assert_ne!(development.key, production.key);
    assert_eq!(development.expires_at, None);
    assert_eq!(production.expires_at, None);
    assert_eq!(development.key_type, KeyType::Development);
    assert_eq!(production.key_type, KeyType::Production);
    assert!(!development.is_trial);
    assert!(!production.is_trial);
    assert_eq!(development.active_flows, Some(1000));
    assert_eq!(production.active_flows, Some(1000));
    assert_eq!(production.email, key.email);
    assert_eq!(production.features, key.features);
    assert_eq!(production.activated_at, Some(JAN1));
}

#[test]
fn convert_persists_both_records() {
    let state = test_state();
    let key = create_trial(&state, "deal@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    let (_, production) =
        lifecycle::convert_deal_closed(&conn, &state.tables, &key.key, 50, JAN1).unwrap();

    let dev = queries::get_key(&conn, &state.tables, &key.key)
        .unwrap()
        .unwrap();
    assert_eq!(dev.key_type, KeyType::Development);
    assert!(!dev.is_trial);
    assert_eq!(dev.expires_at, None);

    let prod = queries::get_key(&conn, &state.tables, &production.key)
        .unwrap()
        .unwrap();
    assert_eq!(prod.key_type, KeyType::Production);
}

#[test]
fn convert_rejects_bad_limit_and_unknown_key() {
    let state = test_state();
    let key = create_trial(&state, "deal@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    let err =
        lifecycle::convert_deal_closed(&conn, &state.tables, &key.key, 0, JAN1).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = lifecycle::convert_deal_closed(&conn, &state.tables, "LK-MISSING", 10, JAN1)
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============ edit ============

#[test]
fn edit_rejects_empty_update() {
    let state = test_state();
    let key = create_trial(&state, "edit@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    let err = lifecycle::edit_key(&conn, &state.tables, &key.key, &EditKey::default(), JAN1)
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn edit_updates_only_named_fields() {
    let state = test_state();
    let key = create_trial(&state, "edit@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    let edit = EditKey {
        notes: Some(Some("VIP customer".to_string())),
        active_flows: Some(Some(500)),
        ..Default::default()
    };
    let updated = lifecycle::edit_key(&conn, &state.tables, &key.key, &edit, JAN1).unwrap();
    assert_eq!(updated.notes.as_deref(), Some("VIP customer"));
    assert_eq!(updated.active_flows, Some(500));
    assert_eq!(updated.expires_at, key.expires_at, "untouched field survives");
    assert_eq!(updated.email, key.email);
}

#[test]
fn edit_null_clears_nullable_fields() {
    let state = test_state();
    let key = create_trial(&state, "edit@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    let edit = EditKey {
        expires_at: Some(None),
        ..Default::default()
    };
    let updated = lifecycle::edit_key(&conn, &state.tables, &key.key, &edit, JAN1).unwrap();
    assert_eq!(updated.expires_at, None);
    // Permissive by design: is_trial was left inconsistent on purpose
    assert!(updated.is_trial);
}

// ============ history ============

#[test]
fn every_transition_appends_history() {
    let state = test_state();
    let key = create_trial(&state, "hist@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    lifecycle::extend_key(&conn, &state.tables, &key.key, 7, JAN1 + DAY).unwrap();
    lifecycle::disable_key(&conn, &state.tables, &key.key, JAN1 + 2 * DAY).unwrap();
    lifecycle::reactivate_key(&conn, &state.tables, &key.key, None, JAN1 + 3 * DAY).unwrap();
    lifecycle::convert_deal_closed(&conn, &state.tables, &key.key, 10, JAN1 + 4 * DAY).unwrap();

    let entries = queries::list_history(&conn, &state.tables, &key.key).unwrap();
    let mut actions: Vec<KeyAction> = entries.iter().map(|e| e.action).collect();
    actions.reverse(); // stored newest-first
    assert_eq!(
        actions,
        vec![
            KeyAction::Created,
            KeyAction::Extended,
            KeyAction::Disabled,
            KeyAction::Reactivated,
            KeyAction::DealClosed,
        ]
    );

    // Detail payloads carry the transition parameters
    let extended = entries
        .iter()
        .find(|e| e.action == KeyAction::Extended)
        .unwrap();
    let details = extended.details.as_ref().unwrap();
    assert_eq!(details["additional_days"], 7);
}

#[test]
fn same_second_history_keeps_insertion_order() {
    let state = test_state();
    let key = create_trial(&state, "burst@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    // All at the same timestamp: ordering must still be newest-insert first
    lifecycle::extend_key(&conn, &state.tables, &key.key, 7, JAN1).unwrap();
    lifecycle::disable_key(&conn, &state.tables, &key.key, JAN1).unwrap();
    lifecycle::reactivate_key(&conn, &state.tables, &key.key, None, JAN1).unwrap();

    let entries = queries::list_history(&conn, &state.tables, &key.key).unwrap();
    let actions: Vec<KeyAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            KeyAction::Reactivated,
            KeyAction::Disabled,
            KeyAction::Extended,
            KeyAction::Created,
        ]
    );
}

#[test]
fn conversion_also_logs_creation_of_production_key() {
    let state = test_state();
    let key = create_trial(&state, "hist@example.com", 14, JAN1);
    let conn = state.db.get().unwrap();

    let (_, production) =
        lifecycle::convert_deal_closed(&conn, &state.tables, &key.key, 10, JAN1).unwrap();
    let entries = queries::list_history(&conn, &state.tables, &production.key).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, KeyAction::Created);
    assert_eq!(
        entries[0].details.as_ref().unwrap()["related_development_key"],
        key.key.as_str()
    );
}

// ============ worked scenario from the ops runbook ============

#[test]
fn full_trial_to_deal_scenario() {
    let state = test_state();
    let conn = state.db.get().unwrap();

    // 2024-01-01: 14-day trial
    let jan1 = 1_704_067_200; // midnight UTC
    let key = lifecycle::create_key(
        &conn,
        &state.tables,
        &create_input("scenario@example.com", Some(14)),
        jan1,
    )
    .unwrap();
    assert_eq!(key.expires_at, Some(jan1 + 14 * DAY)); // 2024-01-15
    assert!(key.is_trial);
    assert_eq!(derive_status(key.expires_at, jan1), KeyStatus::Active);

    // 2024-01-10: extend by 7 -> 2024-01-22
    let jan10 = jan1 + 9 * DAY;
    let key = lifecycle::extend_key(&conn, &state.tables, &key.key, 7, jan10).unwrap();
    assert_eq!(key.expires_at, Some(jan1 + 21 * DAY));

    // 2024-01-10: disable -> expiry today, disabled
    let key = lifecycle::disable_key(&conn, &state.tables, &key.key, jan10).unwrap();
    assert_eq!(key.expires_at, Some(jan10));
    assert_eq!(derive_status(key.expires_at, jan10), KeyStatus::Disabled);

    // 2024-01-11: reactivate 30 -> 2024-02-10, active
    let jan11 = jan10 + DAY;
    let key =
        lifecycle::reactivate_key(&conn, &state.tables, &key.key, Some(30), jan11).unwrap();
    assert_eq!(key.expires_at, Some(jan11 + 30 * DAY));
    assert_eq!(derive_status(key.expires_at, jan11), KeyStatus::Active);

    // Deal closed at 1000 flows -> both keys perpetual
    let (dev, prod) =
        lifecycle::convert_deal_closed(&conn, &state.tables, &key.key, 1000, jan11).unwrap();
    assert_eq!(dev.expires_at, None);
    assert_eq!(prod.expires_at, None);
    assert_eq!(prod.active_flows, Some(1000));
    assert_eq!(prod.features, key.features);
}
