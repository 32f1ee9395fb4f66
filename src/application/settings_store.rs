//! The settings document: remote first, local cache second, defaults last.
//!
//! Reads never fail. A remote document (or the cached one) is merged over
//! [`AppSettings::default`] one top-level section at a time: a section that
//! is present replaces the default section, and a section whose value does
//! not fit its type is skipped so the rest of the document still applies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::application::backend::record_audit;
use crate::domain::error::{ApiError, BackendError};
use crate::domain::settings::{AppSettings, SettingsSection};
use crate::infrastructure::clock::{Clock, SystemClock};
use crate::infrastructure::store::KeyValueStore;
use crate::log;

pub const SETTINGS_KEY: &str = "pulse_app_settings_v1";

/// Where settings live when a server is configured.
pub trait SettingsRemote: Send + Sync {
    /// `Ok(None)` when the server has no document yet.
    fn fetch_settings(&self) -> Result<Option<Value>, ApiError>;
    fn push_settings(&self, settings: &Value) -> Result<(), ApiError>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSaved {
    pub settings: AppSettings,
    /// False when the remote write failed or no remote is configured.
    pub synced: bool,
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    remote: Option<Box<dyn SettingsRemote>>,
    clock: Arc<dyn Clock>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>, remote: Option<Box<dyn SettingsRemote>>) -> Self {
        Self::with_clock(store, remote, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        remote: Option<Box<dyn SettingsRemote>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            remote,
            clock,
        }
    }

    pub fn get_settings(&self) -> AppSettings {
        if let Some(remote) = &self.remote {
            match remote.fetch_settings() {
                Ok(Some(document)) => return merge_over_defaults(&document),
                Ok(None) => log!("Remote settings empty, using local copy"),
                Err(e) => log!("Remote settings fetch failed: {}. Using local copy", e),
            }
        }
        match self.cached_document() {
            Some(document) => merge_over_defaults(&document),
            None => AppSettings::default(),
        }
    }

    /// Pushes to the remote when there is one and always refreshes the
    /// local cache. Only a failed cache write is an error.
    pub fn update_settings(&self, settings: AppSettings) -> Result<SettingsSaved, BackendError> {
        let document = serde_json::to_value(&settings)?;
        let synced = match &self.remote {
            Some(remote) => match remote.push_settings(&document) {
                Ok(()) => true,
                Err(e) => {
                    log!("Remote settings update failed: {}", e);
                    false
                }
            },
            None => false,
        };

        self.store.set(SETTINGS_KEY, &serde_json::to_string(&document)?)?;
        if synced {
            record_audit(
                self.store.as_ref(),
                self.clock.now(),
                "UPDATE",
                "settings",
                SETTINGS_KEY,
                "",
            );
        }
        Ok(SettingsSaved { settings, synced })
    }

    /// Overlays the fields of `partial` onto one section of the current
    /// settings and saves the result.
    pub fn update_section(&self, section: SettingsSection, partial: &Value) -> Result<SettingsSaved, BackendError> {
        let Value::Object(fields) = partial else {
            return Err(BackendError::invalid(format!(
                "{section} update must be a JSON object"
            )));
        };

        let mut document = serde_json::to_value(self.get_settings())?;
        let slot = document
            .get_mut(section.key())
            .ok_or_else(|| BackendError::invalid(format!("unknown settings section: {section}")))?;
        let mut merged = match slot.take() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
        *slot = Value::Object(merged);

        let settings: AppSettings = serde_json::from_value(document)
            .map_err(|e| BackendError::invalid(format!("invalid {section} settings: {e}")))?;
        self.update_settings(settings)
    }

    /// Stamps `backup.lastBackupAt`.
    pub fn record_backup(&self, at: DateTime<Utc>) -> Result<SettingsSaved, BackendError> {
        let mut settings = self.get_settings();
        settings.backup.last_backup_at = Some(at);
        self.update_settings(settings)
    }

    fn cached_document(&self) -> Option<Value> {
        match self.store.get(SETTINGS_KEY) {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    log!("Cached settings unreadable: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log!("Settings cache read failed: {}", e);
                None
            }
        }
    }
}

/// Top-level merge of `document` over the defaults. Unknown keys are ignored.
pub fn merge_over_defaults(document: &Value) -> AppSettings {
    let Ok(Value::Object(mut merged)) = serde_json::to_value(AppSettings::default()) else {
        return AppSettings::default();
    };
    let Value::Object(incoming) = document else {
        return AppSettings::default();
    };

    for (key, section) in incoming {
        if !merged.contains_key(key) {
            continue;
        }
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), section.clone());
        match serde_json::from_value::<AppSettings>(Value::Object(candidate.clone())) {
            Ok(_) => merged = candidate,
            Err(e) => log!("Ignoring settings section {}: {}", key, e),
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}
