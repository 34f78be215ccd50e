//! Subscriber aggregation: the read-only per-customer rollup of all keys
//! sharing an owner email. Never persisted; recomputed on every query.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::models::{KeyType, LicenseKey};
use crate::status::KeyStatus;

/// Composite customer state, by priority: any active trial makes the
/// subscriber a trial, else any active key makes them a customer, else
/// they are inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriberStatus {
    Trial,
    Customer,
    Inactive,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSummary {
    pub email: String,
    pub total_keys: i64,
    pub trial_keys: i64,
    pub development_keys: i64,
    pub production_keys: i64,
    pub active_keys: i64,
    pub latest_created_at: i64,
    pub has_active_trial: bool,
    pub status: SubscriberStatus,
}

/// Group a snapshot of keys by owner email.
///
/// Grouping is exact-match on the stored email. Status is derived per key
/// at `now` before counting. Output is sorted by latest activity, newest
/// first (ties broken by email for a stable order).
pub fn aggregate(keys: &[LicenseKey], now: i64) -> Vec<SubscriberSummary> {
    let mut by_email: HashMap<&str, SubscriberSummary> = HashMap::new();

    for key in keys {
        let entry = by_email
            .entry(key.email.as_str())
            .or_insert_with(|| SubscriberSummary {
                email: key.email.clone(),
                total_keys: 0,
                trial_keys: 0,
                development_keys: 0,
                production_keys: 0,
                active_keys: 0,
                latest_created_at: key.created_at,
                has_active_trial: false,
                status: SubscriberStatus::Inactive,
            });

        entry.total_keys += 1;
        if key.is_trial {
            entry.trial_keys += 1;
        } else {
            match key.key_type {
                KeyType::Development => entry.development_keys += 1,
                KeyType::Production => entry.production_keys += 1,
            }
        }

        let active = key.status(now) == KeyStatus::Active;
        if active {
            entry.active_keys += 1;
            if key.is_trial {
                entry.has_active_trial = true;
            }
        }

        if key.created_at > entry.latest_created_at {
            entry.latest_created_at = key.created_at;
        }
    }

    let mut subscribers: Vec<SubscriberSummary> = by_email
        .into_values()
        .map(|mut s| {
            s.status = if s.has_active_trial {
                SubscriberStatus::Trial
            } else if s.active_keys > 0 {
                SubscriberStatus::Customer
            } else {
                SubscriberStatus::Inactive
            };
            s
        })
        .collect();

    subscribers.sort_by(|a, b| {
        b.latest_created_at
            .cmp(&a.latest_created_at)
            .then_with(|| a.email.cmp(&b.email))
    });
    subscribers
}
