use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::BackendError;
use crate::domain::settings::BackupSettings;
use crate::log;

use super::{Backend, require};

const BACKUP_KEY_PREFIXES: &[&str] = &["credence_", "pulse_"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub created_at: DateTime<Utc>,
    pub data: BTreeMap<String, Value>,
}

impl Backend {
    /// Copies every application key of the store into one document.
    pub fn create_backup(&self) -> Result<BackupSnapshot, BackendError> {
        let mut data = BTreeMap::new();
        for key in self.store().keys()? {
            if !BACKUP_KEY_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
                continue;
            }
            if let Some(value) = self.read_json::<Value>(&key)? {
                data.insert(key, value);
            }
        }
        let snapshot = BackupSnapshot {
            created_at: self.now(),
            data,
        };
        log!("Backup created with {} keys", snapshot.data.len());
        Ok(snapshot)
    }

    /// Writes every key of the snapshot back; keys absent from it are kept.
    pub fn restore_backup(&self, snapshot: &BackupSnapshot) -> Result<usize, BackendError> {
        for key in snapshot.data.keys() {
            require(
                BACKUP_KEY_PREFIXES.iter().any(|prefix| key.starts_with(prefix)),
                format!("unexpected key in backup: {key}"),
            )?;
        }
        for (key, value) in &snapshot.data {
            self.write_json(key, value)?;
        }
        self.audit(
            "RESTORE",
            "backup",
            &snapshot.created_at.to_rfc3339(),
            &format!("{} keys", snapshot.data.len()),
        );
        Ok(snapshot.data.len())
    }
}

/// True when automatic backups are on and the last one is older than the
/// configured frequency (or there has never been one).
pub fn backup_due(settings: &BackupSettings, now: DateTime<Utc>) -> bool {
    if !settings.auto_backup_enabled {
        return false;
    }
    match settings.last_backup_at {
        Some(last) => now - last > Duration::hours(settings.frequency_hours as i64),
        None => true,
    }
}
