use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Employee,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub avatar_initials: String,
    #[serde(default)]
    pub status: ActiveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_cost_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joining_date: Option<String>,
}

/// Initials shown in avatars: first letter of the first two words.
pub fn avatar_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
    Archived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    #[default]
    Hourly,
    Fixed,
    NonBillable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateLogic {
    #[default]
    Project,
    Member,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryRules {
    pub require_notes: bool,
    pub allow_future_entries: bool,
    pub max_hours_per_day: f64,
}

impl Default for EntryRules {
    fn default() -> Self {
        Self {
            require_notes: false,
            allow_future_entries: true,
            max_hours_per_day: 24.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectAlerts {
    pub budget_threshold_percent: u8,
    pub notify_on_overrun: bool,
}

impl Default for ProjectAlerts {
    fn default() -> Self {
        Self {
            budget_threshold_percent: 80,
            notify_on_overrun: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub code: String,
    pub name: String,
    pub client_id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub billing_mode: BillingMode,
    #[serde(default)]
    pub rate_logic: RateLogic,
    #[serde(default)]
    pub budget_amount: f64,
    #[serde(default)]
    pub global_rate: f64,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
    #[serde(default)]
    pub entry_rules: EntryRules,
    #[serde(default)]
    pub alerts: ProjectAlerts,
    /// Maintained by the rollup step, never edited directly.
    #[serde(default)]
    pub used_hours: f64,
    #[serde(default)]
    pub billable_hours: f64,
}

impl Project {
    /// Billing rate for a member, honouring member-level rates when configured.
    pub fn rate_for(&self, user_id: &str) -> f64 {
        if self.rate_logic == RateLogic::Member {
            if let Some(rate) = self
                .team_members
                .iter()
                .find(|member| member.user_id == user_id)
                .and_then(|member| member.rate)
            {
                return rate;
            }
        }
        self.global_rate
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: ActiveStatus,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Maintained by the rollup step.
    #[serde(default)]
    pub total_projects: u32,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCategory {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_billable: bool,
    #[serde(default)]
    pub is_proof_required: bool,
    #[serde(default)]
    pub is_notes_required: bool,
    #[serde(default)]
    pub restricted_to_projects: Vec<String>,
    #[serde(default)]
    pub status: ActiveStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    Rejected,
    Locked,
}

impl EntryStatus {
    pub fn label(self) -> &'static str {
        match self {
            EntryStatus::Draft => "DRAFT",
            EntryStatus::Submitted => "SUBMITTED",
            EntryStatus::Approved => "APPROVED",
            EntryStatus::Rejected => "REJECTED",
            EntryStatus::Locked => "LOCKED",
        }
    }

    /// Locked entries never move; approved entries may only be locked.
    pub fn can_move_to(self, next: EntryStatus) -> bool {
        match self {
            EntryStatus::Locked => next == EntryStatus::Locked,
            EntryStatus::Approved => matches!(next, EntryStatus::Approved | EntryStatus::Locked),
            _ => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub duration_minutes: i64,
    #[serde(default)]
    pub is_billable: bool,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub description: String,
}

impl TimeEntry {
    pub fn hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[default]
    Submitted,
    Pending,
    Approved,
    Rejected,
    Overdue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    #[serde(default)]
    pub id: String,
    pub employee_id: String,
    #[serde(default)]
    pub employee_name: String,
    /// Monday (or configured first day) of the week, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_start: Option<String>,
    #[serde(default)]
    pub week_range: String,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub billable_hours: f64,
    #[serde(default)]
    pub non_billable_hours: f64,
    #[serde(default)]
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Partial,
    Overdue,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(default)]
    pub id: String,
    pub date: String,
    pub amount: f64,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub reference: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub invoice_no: String,
    pub client_id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: String,
    pub issue_date: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub balance_amount: f64,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

impl Invoice {
    /// Derives line amounts and every money total from items and payments.
    pub fn recalculate(&mut self) {
        for item in &mut self.items {
            item.amount = round_cents(item.quantity * item.unit_price);
        }
        self.subtotal = round_cents(self.items.iter().map(|item| item.amount).sum());
        self.tax_amount = round_cents(self.subtotal * self.tax_rate / 100.0);
        self.total_amount = round_cents(self.subtotal + self.tax_amount);
        self.paid_amount = round_cents(self.payments.iter().map(|p| p.amount).sum());
        self.balance_amount = round_cents(self.total_amount - self.paid_amount);

        if self.paid_amount > 0.0 && self.status != InvoiceStatus::Cancelled {
            self.status = if self.balance_amount <= 0.0 {
                InvoiceStatus::Paid
            } else {
                InvoiceStatus::Partial
            };
        }
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayrollStatus {
    #[default]
    Draft,
    Finalized,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRun {
    #[serde(default)]
    pub id: String,
    pub period: String,
    pub period_start: String,
    pub period_end: String,
    pub created_at: DateTime<Utc>,
    pub employee_count: usize,
    pub total_approved_hours: f64,
    pub total_payable: f64,
    #[serde(default)]
    pub status: PayrollStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    #[serde(default)]
    pub id: String,
    pub run_id: String,
    pub employee_id: String,
    pub employee_name: String,
    pub total_hours: f64,
    pub billable_hours: f64,
    pub non_billable_hours: f64,
    pub hourly_rate: f64,
    pub base_pay: f64,
    #[serde(default)]
    pub overtime_hours: f64,
    #[serde(default)]
    pub overtime_pay: f64,
    pub total_payable: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityKind {
    Leave,
    Holiday,
    WorkFromHome,
    HalfDay,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityEvent {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub kind: AvailabilityKind,
    #[serde(default)]
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignment {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(default)]
    pub id: String,
    pub at: DateTime<Utc>,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn label(&self) -> String {
        format!("{}..{}", self.start, self.end)
    }
}
