//! White-label branding and usage settings.
//!
//! Process-wide, not persisted: the defaults below are served until a PUT
//! replaces individual fields, and a restart resets them. PUT is a shallow
//! merge; omitted fields keep their current value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub organization_name: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub logo_url: String,
    pub api_key: String,
    pub token_limit: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            organization_name: "Acme Corp".to_string(),
            primary_color: "#3b82f6".to_string(),
            secondary_color: "#10b981".to_string(),
            logo_url: String::new(),
            api_key: String::new(),
            token_limit: 100_000,
        }
    }
}

/// Partial update: present fields overwrite, absent fields are kept.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub token_limit: Option<u64>,
}

impl Settings {
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(v) = update.organization_name {
            self.organization_name = v;
        }
        if let Some(v) = update.primary_color {
            self.primary_color = v;
        }
        if let Some(v) = update.secondary_color {
            self.secondary_color = v;
        }
        if let Some(v) = update.logo_url {
            self.logo_url = v;
        }
        if let Some(v) = update.api_key {
            self.api_key = v;
        }
        if let Some(v) = update.token_limit {
            self.token_limit = v;
        }
    }
}
