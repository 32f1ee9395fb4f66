use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::BillingMode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanySettings {
    pub name: String,
    pub legal_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub timezone: String,
    pub currency: String,
    pub fiscal_year_start_month: u32,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            name: "Credence".to_string(),
            legal_name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            timezone: "UTC".to_string(),
            currency: "USD".to_string(),
            fiscal_year_start_month: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimesheetSettings {
    pub week_start_day: String,
    pub min_entry_minutes: u32,
    pub max_hours_per_day: f64,
    pub allow_future_entries: bool,
    pub require_notes: bool,
    pub auto_submit: bool,
    pub submission_deadline_day: String,
    pub lock_after_approval: bool,
}

impl Default for TimesheetSettings {
    fn default() -> Self {
        Self {
            week_start_day: "MONDAY".to_string(),
            min_entry_minutes: 15,
            max_hours_per_day: 12.0,
            allow_future_entries: false,
            require_notes: false,
            auto_submit: false,
            submission_deadline_day: "FRIDAY".to_string(),
            lock_after_approval: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillingSettings {
    pub invoice_prefix: String,
    pub default_tax_rate: f64,
    pub payment_terms_days: u32,
    pub default_billing_rate: f64,
    pub currency: String,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            invoice_prefix: "INV".to_string(),
            default_tax_rate: 18.0,
            payment_terms_days: 30,
            default_billing_rate: 100.0,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrollSettings {
    pub pay_frequency: String,
    pub default_hourly_rate: f64,
    pub overtime_enabled: bool,
    pub overtime_threshold_hours: f64,
    pub overtime_multiplier: f64,
    pub approved_hours_only: bool,
}

impl Default for PayrollSettings {
    fn default() -> Self {
        Self {
            pay_frequency: "MONTHLY".to_string(),
            default_hourly_rate: 25.0,
            overtime_enabled: false,
            overtime_threshold_hours: 40.0,
            overtime_multiplier: 1.5,
            approved_hours_only: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    pub session_timeout_minutes: u32,
    pub password_min_length: u32,
    pub require_two_factor: bool,
    pub max_login_attempts: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 60,
            password_min_length: 8,
            require_two_factor: false,
            max_login_attempts: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub email_enabled: bool,
    pub timesheet_reminders: bool,
    pub approval_alerts: bool,
    pub invoice_alerts: bool,
    pub reminder_day: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_enabled: true,
            timesheet_reminders: true,
            approval_alerts: true,
            invoice_alerts: true,
            reminder_day: "FRIDAY".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    pub default_currency: String,
    pub require_contact_email: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            require_contact_email: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    pub code_prefix: String,
    pub default_billing_mode: BillingMode,
    pub budget_alert_percent: u8,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            code_prefix: "PRJ".to_string(),
            default_billing_mode: BillingMode::Hourly,
            budget_alert_percent: 80,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            from_address: String::new(),
            from_name: "Credence".to_string(),
            use_tls: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupSettings {
    pub auto_backup_enabled: bool,
    pub frequency_hours: u32,
    pub retention_days: u32,
    pub last_backup_at: Option<DateTime<Utc>>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            auto_backup_enabled: true,
            frequency_hours: 24,
            retention_days: 30,
            last_backup_at: None,
        }
    }
}

/// The whole settings document. Sections are replaced wholesale when merged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppSettings {
    pub company: CompanySettings,
    pub timesheet: TimesheetSettings,
    pub billing: BillingSettings,
    pub payroll: PayrollSettings,
    pub security: SecuritySettings,
    pub notifications: NotificationSettings,
    pub client: ClientSettings,
    pub project: ProjectSettings,
    pub email: EmailSettings,
    pub backup: BackupSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsSection {
    Company,
    Timesheet,
    Billing,
    Payroll,
    Security,
    Notifications,
    Client,
    Project,
    Email,
    Backup,
}

impl SettingsSection {
    pub const ALL: [SettingsSection; 10] = [
        SettingsSection::Company,
        SettingsSection::Timesheet,
        SettingsSection::Billing,
        SettingsSection::Payroll,
        SettingsSection::Security,
        SettingsSection::Notifications,
        SettingsSection::Client,
        SettingsSection::Project,
        SettingsSection::Email,
        SettingsSection::Backup,
    ];

    /// Top-level key of the section in the settings document.
    pub fn key(self) -> &'static str {
        match self {
            SettingsSection::Company => "company",
            SettingsSection::Timesheet => "timesheet",
            SettingsSection::Billing => "billing",
            SettingsSection::Payroll => "payroll",
            SettingsSection::Security => "security",
            SettingsSection::Notifications => "notifications",
            SettingsSection::Client => "client",
            SettingsSection::Project => "project",
            SettingsSection::Email => "email",
            SettingsSection::Backup => "backup",
        }
    }
}

impl fmt::Display for SettingsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SettingsSection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        SettingsSection::ALL
            .into_iter()
            .find(|section| section.key() == wanted)
            .ok_or_else(|| format!("unknown settings section: {value}"))
    }
}
