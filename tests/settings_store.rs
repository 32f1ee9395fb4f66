use std::sync::{Arc, Mutex};

use credence_ops::application::settings_store::{SETTINGS_KEY, SettingsRemote, SettingsStore};
use credence_ops::domain::error::ApiError;
use credence_ops::domain::settings::{AppSettings, SettingsSection};
use credence_ops::infrastructure::store::{KeyValueStore, MemoryStore};
use serde_json::{Value, json};

/// Stand-in for the `/settings` endpoint.
#[derive(Default)]
struct Server {
    document: Mutex<Option<Value>>,
    down: Mutex<bool>,
}

struct Remote(Arc<Server>);

impl SettingsRemote for Remote {
    fn fetch_settings(&self) -> Result<Option<Value>, ApiError> {
        if *self.0.down.lock().unwrap() {
            return Err(ApiError::Transport("timed out".into()));
        }
        Ok(self.0.document.lock().unwrap().clone())
    }

    fn push_settings(&self, settings: &Value) -> Result<(), ApiError> {
        if *self.0.down.lock().unwrap() {
            return Err(ApiError::Transport("timed out".into()));
        }
        *self.0.document.lock().unwrap() = Some(settings.clone());
        Ok(())
    }
}

fn connected() -> (SettingsStore, Arc<Server>, Arc<MemoryStore>) {
    let server = Arc::new(Server::default());
    let memory = Arc::new(MemoryStore::new());
    let store = SettingsStore::new(memory.clone(), Some(Box::new(Remote(server.clone()))));
    (store, server, memory)
}

#[test]
fn update_then_get_round_trips() {
    let (store, _, _) = connected();
    let mut settings = AppSettings::default();
    settings.company.name = "Credence Consulting".into();
    settings.billing.default_tax_rate = 5.0;
    settings.payroll.overtime_enabled = true;

    let saved = store.update_settings(settings.clone()).unwrap();
    assert!(saved.synced);
    assert_eq!(store.get_settings(), settings);
}

#[test]
fn partial_remote_document_keeps_defaults_for_absent_sections() {
    let (store, server, _) = connected();
    *server.document.lock().unwrap() = Some(json!({
        "company": {"name": "Remote Co", "currency": "EUR"}
    }));

    let settings = store.get_settings();
    let defaults = AppSettings::default();
    assert_eq!(settings.company.name, "Remote Co");
    assert_eq!(settings.company.currency, "EUR");
    assert_eq!(settings.timesheet, defaults.timesheet);
    assert_eq!(settings.backup, defaults.backup);
}

#[test]
fn outage_falls_back_to_the_local_copy() {
    let (store, server, memory) = connected();
    let mut settings = AppSettings::default();
    settings.notifications.reminder_day = "THURSDAY".into();
    store.update_settings(settings.clone()).unwrap();

    *server.down.lock().unwrap() = true;
    assert_eq!(store.get_settings(), settings);

    // a failed push is still cached locally
    settings.notifications.reminder_day = "MONDAY".into();
    let saved = store.update_settings(settings.clone()).unwrap();
    assert!(!saved.synced);
    assert_eq!(store.get_settings().notifications.reminder_day, "MONDAY");
    assert!(memory.get(SETTINGS_KEY).unwrap().is_some());
}

#[test]
fn corrupt_cache_gives_defaults() {
    let memory = Arc::new(MemoryStore::new());
    memory.set(SETTINGS_KEY, "{not json").unwrap();
    let store = SettingsStore::new(memory, None);
    assert_eq!(store.get_settings(), AppSettings::default());
}

#[test]
fn section_update_goes_through_the_remote() {
    let (store, server, _) = connected();
    store
        .update_section(SettingsSection::Billing, &json!({"invoicePrefix": "CRD"}))
        .unwrap();
    let pushed = server.document.lock().unwrap().clone().unwrap();
    assert_eq!(pushed["billing"]["invoicePrefix"], "CRD");
    assert_eq!(pushed["billing"]["paymentTermsDays"], 30);
}
