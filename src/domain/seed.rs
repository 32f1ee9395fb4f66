//! Built-in demo data written the first time an empty collection is read.
//!
//! Rollup fields here agree with what the rollup step would compute from
//! the seeded entries.

use crate::domain::models::*;

pub fn users() -> Vec<User> {
    vec![
        user("CRED001/01-22", "Anita Desai", "anita@credence.example", Role::Admin, "Operations", "Operations Manager", None),
        user("CRED002/03-22", "Rahul Verma", "rahul@credence.example", Role::Employee, "Engineering", "Senior Developer", Some(45.0)),
        user("CRED003/06-22", "Meera Iyer", "meera@credence.example", Role::Employee, "Design", "UX Designer", Some(38.0)),
        user("CRED004/08-22", "Karan Shah", "karan@credence.example", Role::Employee, "Engineering", "Developer", None),
    ]
}

fn user(
    id: &str,
    name: &str,
    email: &str,
    role: Role,
    department: &str,
    designation: &str,
    rate: Option<f64>,
) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        department: department.to_string(),
        designation: designation.to_string(),
        avatar_initials: avatar_initials(name),
        status: ActiveStatus::Active,
        hourly_cost_rate: rate,
        joining_date: None,
    }
}

pub fn clients() -> Vec<Client> {
    vec![
        client("cl-1", "Northwind", "Northwind Traders Ltd", "billing@northwind.example", 2),
        client("cl-2", "Bluefin", "Bluefin Analytics", "accounts@bluefin.example", 1),
    ]
}

fn client(id: &str, name: &str, company: &str, email: &str, total_projects: u32) -> Client {
    Client {
        id: id.to_string(),
        name: name.to_string(),
        company_name: company.to_string(),
        email: email.to_string(),
        status: ActiveStatus::Active,
        currency: "USD".to_string(),
        total_projects,
        contacts: Vec::new(),
    }
}

pub fn projects() -> Vec<Project> {
    vec![
        project("prj-1", "PRJ-001", "Customer Portal", "cl-1", "Northwind", 14.0, 12.0),
        project("prj-2", "PRJ-002", "Brand Refresh", "cl-1", "Northwind", 7.0, 6.0),
        project("prj-3", "PRJ-003", "Data Pipeline", "cl-2", "Bluefin", 5.0, 5.0),
    ]
}

fn project(
    id: &str,
    code: &str,
    name: &str,
    client_id: &str,
    client_name: &str,
    used: f64,
    billable: f64,
) -> Project {
    Project {
        id: id.to_string(),
        code: code.to_string(),
        name: name.to_string(),
        client_id: client_id.to_string(),
        client_name: client_name.to_string(),
        status: ProjectStatus::Active,
        billing_mode: BillingMode::Hourly,
        rate_logic: RateLogic::Project,
        budget_amount: 20000.0,
        global_rate: 95.0,
        team_members: Vec::new(),
        entry_rules: EntryRules::default(),
        alerts: ProjectAlerts::default(),
        used_hours: used,
        billable_hours: billable,
    }
}

pub fn task_categories() -> Vec<TaskCategory> {
    vec![
        category("cat-1", "Development", true, false),
        category("cat-2", "Design", true, false),
        category("cat-3", "Meetings", false, false),
        category("cat-4", "Support", true, true),
    ]
}

fn category(id: &str, name: &str, billable: bool, notes_required: bool) -> TaskCategory {
    TaskCategory {
        id: id.to_string(),
        name: name.to_string(),
        is_billable: billable,
        is_proof_required: false,
        is_notes_required: notes_required,
        restricted_to_projects: Vec::new(),
        status: ActiveStatus::Active,
    }
}

pub fn time_entries() -> Vec<TimeEntry> {
    vec![
        entry("te-1", "CRED002/03-22", "prj-1", "cat-1", "2024-06-03", 480, true, EntryStatus::Submitted),
        entry("te-2", "CRED002/03-22", "prj-1", "cat-3", "2024-06-04", 120, false, EntryStatus::Submitted),
        entry("te-3", "CRED003/06-22", "prj-2", "cat-2", "2024-06-04", 360, true, EntryStatus::Draft),
        entry("te-4", "CRED003/06-22", "prj-1", "cat-2", "2024-06-05", 240, true, EntryStatus::Draft),
        entry("te-5", "CRED004/08-22", "prj-3", "cat-1", "2024-06-05", 300, true, EntryStatus::Draft),
        entry("te-6", "CRED004/08-22", "prj-2", "cat-3", "2024-06-06", 60, false, EntryStatus::Draft),
    ]
}

#[allow(clippy::too_many_arguments)]
fn entry(
    id: &str,
    user_id: &str,
    project_id: &str,
    category_id: &str,
    date: &str,
    minutes: i64,
    billable: bool,
    status: EntryStatus,
) -> TimeEntry {
    TimeEntry {
        id: id.to_string(),
        user_id: user_id.to_string(),
        project_id: project_id.to_string(),
        category_id: Some(category_id.to_string()),
        date: date.to_string(),
        start_time: None,
        end_time: None,
        duration_minutes: minutes,
        is_billable: billable,
        status,
        description: String::new(),
    }
}

pub fn approvals() -> Vec<ApprovalRequest> {
    vec![ApprovalRequest {
        id: "apr-1".to_string(),
        employee_id: "CRED002/03-22".to_string(),
        employee_name: "Rahul Verma".to_string(),
        week_start: Some("2024-06-03".to_string()),
        week_range: "2024-06-03 - 2024-06-09".to_string(),
        total_hours: 10.0,
        billable_hours: 8.0,
        non_billable_hours: 2.0,
        status: ApprovalStatus::Submitted,
        submitted_at: None,
        comment: None,
    }]
}

pub fn invoices() -> Vec<Invoice> {
    let mut invoice = Invoice {
        id: "inv-1".to_string(),
        invoice_no: "INV-2024-0001".to_string(),
        client_id: "cl-2".to_string(),
        client_name: "Bluefin".to_string(),
        project_id: Some("prj-3".to_string()),
        project_name: "Data Pipeline".to_string(),
        issue_date: "2024-05-31".to_string(),
        due_date: "2024-06-30".to_string(),
        items: vec![InvoiceItem {
            description: "Pipeline build-out, May".to_string(),
            quantity: 40.0,
            unit_price: 95.0,
            amount: 0.0,
        }],
        tax_rate: 18.0,
        subtotal: 0.0,
        tax_amount: 0.0,
        total_amount: 0.0,
        paid_amount: 0.0,
        balance_amount: 0.0,
        status: InvoiceStatus::Sent,
        payments: Vec::new(),
    };
    invoice.recalculate();
    vec![invoice]
}
