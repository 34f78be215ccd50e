use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, EnumString};

use crate::status::{KeyStatus, derive_status};

/// Key type in the target schema. A trial is a development-type key with
/// `is_trial` set; conversion flips `is_trial` off and issues a production
/// sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyType {
    Development,
    Production,
}

/// Defines the full set of per-key capability toggles in one place.
/// Generates the flag struct, the per-flag override struct used by create
/// and edit bodies, and the human-readable labels the email templates use.
macro_rules! feature_flags {
    ($(($field:ident, $label:literal)),+ $(,)?) => {
        /// Independent capability toggles carried on every key.
        /// Serialized in camelCase to match the stored schema.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct FeatureFlags {
            $(pub $field: bool,)+
        }

        /// Per-flag overrides; `None` leaves the preset (or stored) value alone.
        #[derive(Debug, Clone, Copy, Default, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct FeatureOverrides {
            $(pub $field: Option<bool>,)+
        }

        impl FeatureOverrides {
            /// Apply explicit overrides on top of a base set; overrides win.
            pub fn apply_to(&self, base: FeatureFlags) -> FeatureFlags {
                FeatureFlags {
                    $($field: self.$field.unwrap_or(base.$field),)+
                }
            }

            pub fn is_empty(&self) -> bool {
                $(self.$field.is_none())&&+
            }
        }

        impl FeatureFlags {
            /// Labels of enabled features, for email bodies.
            pub fn enabled_labels(&self) -> Vec<&'static str> {
                let mut labels = Vec::new();
                $(if self.$field { labels.push($label); })+
                labels
            }
        }
    };
}

feature_flags! {
    (sso_enabled, "SSO"),
    (git_sync_enabled, "Git Sync"),
    (show_powered_by, "Display \"Powered by\" badge"),
    (embedding_enabled, "Embedding"),
    (audit_log_enabled, "Audit Log"),
    (custom_appearance_enabled, "Custom Appearance"),
    (manage_projects_enabled, "Manage Projects"),
    (manage_pieces_enabled, "Manage Pieces"),
    (manage_templates_enabled, "Manage Templates"),
    (api_keys_enabled, "API Keys"),
    (custom_domains_enabled, "Custom Domains"),
    (project_roles_enabled, "Project Roles"),
    (flow_issues_enabled, "Flow Issues"),
    (alerts_enabled, "Alerts"),
    (analytics_enabled, "Analytics"),
    (global_connections_enabled, "Global Connections"),
    (custom_roles_enabled, "Custom Roles"),
    (environments_enabled, "Environments"),
    (agents_enabled, "Agents"),
    (tables_enabled, "Tables"),
    (todos_enabled, "Todos"),
    (mcps_enabled, "MCPs"),
}

/// Named starting points for the flag set at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeaturePreset {
    Minimal,
    Business,
    Enterprise,
    All,
}

impl Default for FeaturePreset {
    fn default() -> Self {
        FeaturePreset::Business
    }
}

impl FeatureFlags {
    pub fn preset(preset: FeaturePreset) -> Self {
        match preset {
            FeaturePreset::Minimal => Self {
                show_powered_by: true,
                ..Self::default()
            },
            FeaturePreset::Business => Self {
                show_powered_by: true,
                git_sync_enabled: true,
                manage_projects_enabled: true,
                manage_pieces_enabled: true,
                manage_templates_enabled: true,
                api_keys_enabled: true,
                project_roles_enabled: true,
                flow_issues_enabled: true,
                alerts_enabled: true,
                analytics_enabled: true,
                tables_enabled: true,
                todos_enabled: true,
                mcps_enabled: true,
                ..Self::default()
            },
            // Everything except the badge and custom domains (managed
            // separately by the hosting side).
            FeaturePreset::Enterprise => Self {
                show_powered_by: false,
                custom_domains_enabled: false,
                ..Self::all()
            },
            FeaturePreset::All => Self::all(),
        }
    }

    fn all() -> Self {
        Self {
            sso_enabled: true,
            git_sync_enabled: true,
            show_powered_by: true,
            embedding_enabled: true,
            audit_log_enabled: true,
            custom_appearance_enabled: true,
            manage_projects_enabled: true,
            manage_pieces_enabled: true,
            manage_templates_enabled: true,
            api_keys_enabled: true,
            custom_domains_enabled: true,
            project_roles_enabled: true,
            flow_issues_enabled: true,
            alerts_enabled: true,
            analytics_enabled: true,
            global_connections_enabled: true,
            custom_roles_enabled: true,
            environments_enabled: true,
            agents_enabled: true,
            tables_enabled: true,
            todos_enabled: true,
            mcps_enabled: true,
        }
    }
}

/// The central entity. `key` is the primary identifier; there is no
/// surrogate id in the target schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKey {
    pub key: String,
    pub email: String,
    pub key_type: KeyType,
    pub is_trial: bool,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<i64>,
    pub expires_at: Option<i64>,
    /// Usage entitlement; None = unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_flows: Option<i64>,
    #[serde(flatten)]
    pub features: FeatureFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_employees: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl LicenseKey {
    pub fn status(&self, now: i64) -> KeyStatus {
        derive_status(self.expires_at, now)
    }
}

/// Response shape: the stored record plus its derived status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKeyView {
    #[serde(flatten)]
    pub key: LicenseKey,
    pub status: KeyStatus,
}

impl LicenseKeyView {
    pub fn new(key: LicenseKey, now: i64) -> Self {
        let status = key.status(now);
        Self { key, status }
    }
}

/// Optional descriptive fields captured at creation; no lifecycle effect.
/// Accepts both snake_case and camelCase spellings, like all request bodies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyProfile {
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default, alias = "companyName")]
    pub company_name: Option<String>,
    #[serde(default, alias = "numberOfEmployees")]
    pub number_of_employees: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Input for issuing a key. `valid_days` present => trial development key;
/// absent/null => subscribed production key with no expiry.
#[derive(Debug, Deserialize)]
pub struct CreateKey {
    pub email: String,
    #[serde(default, alias = "validDays")]
    pub valid_days: Option<i64>,
    #[serde(default)]
    pub preset: Option<FeaturePreset>,
    /// Per-flag overrides on top of the preset
    #[serde(default)]
    pub features: Option<FeatureOverrides>,
    #[serde(default, alias = "activeFlows")]
    pub active_flows: Option<i64>,
    #[serde(flatten)]
    pub profile: KeyProfile,
    /// Send the trial welcome email after creation (best-effort)
    #[serde(default, alias = "sendEmail")]
    pub send_email: bool,
}

/// Deserialize a field so that "absent" and "present but null" are
/// distinguishable: absent = None, null = Some(None), value = Some(Some(v)).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Generic partial update. Nullable columns use the double-option pattern:
/// omitted = unchanged, null = clear, value = set.
///
/// Deliberately does not re-validate cross-field consistency (for example
/// `is_trial` against a finite expiry); matches the permissiveness of the
/// original tool.
#[derive(Debug, Default, Deserialize)]
pub struct EditKey {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "keyType")]
    pub key_type: Option<KeyType>,
    #[serde(default, alias = "isTrial")]
    pub is_trial: Option<bool>,
    #[serde(default, alias = "expiresAt", deserialize_with = "double_option")]
    pub expires_at: Option<Option<i64>>,
    #[serde(default, alias = "activatedAt", deserialize_with = "double_option")]
    pub activated_at: Option<Option<i64>>,
    #[serde(default, alias = "activeFlows", deserialize_with = "double_option")]
    pub active_flows: Option<Option<i64>>,
    #[serde(default)]
    pub features: Option<FeatureOverrides>,
    #[serde(default, alias = "fullName", deserialize_with = "double_option")]
    pub full_name: Option<Option<String>>,
    #[serde(default, alias = "companyName", deserialize_with = "double_option")]
    pub company_name: Option<Option<String>>,
    #[serde(default, alias = "numberOfEmployees", deserialize_with = "double_option")]
    pub number_of_employees: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub goal: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl EditKey {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.key_type.is_none()
            && self.is_trial.is_none()
            && self.expires_at.is_none()
            && self.activated_at.is_none()
            && self.active_flows.is_none()
            && self.features.as_ref().is_none_or(|f| f.is_empty())
            && self.full_name.is_none()
            && self.company_name.is_none()
            && self.number_of_employees.is_none()
            && self.goal.is_none()
            && self.notes.is_none()
    }
}
