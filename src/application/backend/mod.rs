//! Typed CRUD over the key-value store.
//!
//! Each entity collection is one JSON array under a fixed key. Reading an
//! absent key seeds it with the built-in demo data (unless seeding is off).
//! Every operation reports failure through [`BackendError`].

mod approvals;
mod backup;
mod entries;
mod invoices;
mod payroll;
mod people;
mod projects;
mod records;
mod rollups;
mod timer;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::error::BackendError;
use crate::domain::models::AuditEntry;
use crate::infrastructure::clock::{Clock, SystemClock};
use crate::infrastructure::store::KeyValueStore;
use crate::log;

pub use backup::{BackupSnapshot, backup_due};
pub use invoices::InvoiceTerms;
pub use payroll::{DEFAULT_HOURLY_RATE, PayrollOptions, PayrollResult};
pub use records::Record;

pub const AUDIT_KEY: &str = "credence_audit_log_v1";
const AUDIT_LIMIT: usize = 500;

pub struct Backend {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    seed: bool,
}

impl Backend {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            seed: true,
        }
    }

    /// Start from empty collections instead of the demo data.
    pub fn without_seed(mut self) -> Self {
        self.seed = false;
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The whole collection, seeding it on first read.
    pub fn list<T: Record>(&self) -> Result<Vec<T>, BackendError> {
        match self.store.get(T::KEY)? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => {
                let seeded = if self.seed { T::seed() } else { Vec::new() };
                if !seeded.is_empty() {
                    log!("Seeding {} with {} records", T::KEY, seeded.len());
                }
                self.save(&seeded)?;
                Ok(seeded)
            }
        }
    }

    pub fn find<T: Record>(&self, id: &str) -> Result<T, BackendError> {
        self.list::<T>()?
            .into_iter()
            .find(|item| item.id() == id)
            .ok_or_else(|| BackendError::not_found(T::ENTITY, id))
    }

    pub(crate) fn save<T: Record>(&self, items: &[T]) -> Result<(), BackendError> {
        self.write_json(T::KEY, items)
    }

    /// Replaces a whole collection, e.g. with a list pulled from the server.
    pub fn replace_all<T: Record>(&self, items: Vec<T>) -> Result<usize, BackendError> {
        self.save(&items)?;
        self.audit("REPLACE_ALL", T::ENTITY, "*", &format!("{} records", items.len()));
        Ok(items.len())
    }

    /// Appends with a freshly generated id; any id on the input is ignored.
    pub(crate) fn insert<T: Record>(&self, mut item: T) -> Result<T, BackendError> {
        let mut items = self.list::<T>()?;
        let id = T::generate_id(&items, self.now());
        item.set_id(id);
        items.push(item.clone());
        self.save(&items)?;
        self.audit("CREATE", T::ENTITY, item.id(), "");
        Ok(item)
    }

    pub(crate) fn replace<T: Record>(&self, item: T) -> Result<T, BackendError> {
        let mut items = self.list::<T>()?;
        let slot = items
            .iter_mut()
            .find(|existing| existing.id() == item.id())
            .ok_or_else(|| BackendError::not_found(T::ENTITY, item.id()))?;
        *slot = item.clone();
        self.save(&items)?;
        self.audit("UPDATE", T::ENTITY, item.id(), "");
        Ok(item)
    }

    pub(crate) fn remove<T: Record>(&self, id: &str) -> Result<T, BackendError> {
        let mut items = self.list::<T>()?;
        let index = items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| BackendError::not_found(T::ENTITY, id))?;
        let removed = items.remove(index);
        self.save(&items)?;
        self.audit("DELETE", T::ENTITY, id, "");
        Ok(removed)
    }

    pub(crate) fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BackendError> {
        match self.store.get(key)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), BackendError> {
        let text = serde_json::to_string(value)?;
        self.store.set(key, &text)?;
        Ok(())
    }

    pub fn audit_log(&self) -> Result<Vec<AuditEntry>, BackendError> {
        Ok(self.read_json(AUDIT_KEY)?.unwrap_or_default())
    }

    fn audit(&self, action: &str, entity: &str, entity_id: &str, detail: &str) {
        record_audit(self.store.as_ref(), self.now(), action, entity, entity_id, detail);
    }
}

/// Appends to the audit log. Failures are logged, never raised.
pub(crate) fn record_audit(
    store: &dyn KeyValueStore,
    at: DateTime<Utc>,
    action: &str,
    entity: &str,
    entity_id: &str,
    detail: &str,
) {
    let mut entries: Vec<AuditEntry> = match store.get(AUDIT_KEY) {
        Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_default(),
        Ok(None) => Vec::new(),
        Err(error) => {
            log!("Audit read failed: {}", error);
            return;
        }
    };
    let next = entries.len() as u64 + 1;
    let id = match entries.last() {
        Some(last) => format!("aud-{}", records::numeric_suffix(&last.id, "aud-").unwrap_or(next) + 1),
        None => "aud-1".to_string(),
    };
    entries.push(AuditEntry {
        id,
        at,
        action: action.to_string(),
        entity: entity.to_string(),
        entity_id: entity_id.to_string(),
        detail: detail.to_string(),
    });
    if entries.len() > AUDIT_LIMIT {
        let overflow = entries.len() - AUDIT_LIMIT;
        entries.drain(..overflow);
    }
    match serde_json::to_string(&entries) {
        Ok(text) => {
            if let Err(error) = store.set(AUDIT_KEY, &text) {
                log!("Audit write failed: {}", error);
            }
        }
        Err(error) => log!("Audit encode failed: {}", error),
    }
}

pub(crate) fn require(condition: bool, message: impl Into<String>) -> Result<(), BackendError> {
    if condition {
        Ok(())
    } else {
        Err(BackendError::invalid(message))
    }
}
