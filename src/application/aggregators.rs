//! Read-only joins over collections already loaded from the backend.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::models::*;
use crate::utils::parsing::{parse_date, week_label, week_range};

const UNKNOWN: &str = "Unknown";

pub const CSV_HEADER: [&str; 8] = [
    "ID",
    "Date",
    "User",
    "Project",
    "Category",
    "Duration (m)",
    "Billable",
    "Status",
];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRow {
    pub id: String,
    pub date: String,
    pub user_id: String,
    pub employee_name: String,
    pub project_id: String,
    pub project_name: String,
    pub category_name: String,
    pub duration_minutes: i64,
    pub hours: f64,
    pub is_billable: bool,
    pub status: EntryStatus,
    pub description: String,
}

pub fn enrich_entries(
    entries: &[TimeEntry],
    users: &[User],
    projects: &[Project],
    categories: &[TaskCategory],
) -> Vec<EntryRow> {
    entries
        .iter()
        .map(|entry| EntryRow {
            id: entry.id.clone(),
            date: entry.date.clone(),
            user_id: entry.user_id.clone(),
            employee_name: name_of(users, &entry.user_id, |u| &u.id, |u| &u.name),
            project_id: entry.project_id.clone(),
            project_name: name_of(projects, &entry.project_id, |p| &p.id, |p| &p.name),
            category_name: match &entry.category_id {
                Some(id) => name_of(categories, id, |c| &c.id, |c| &c.name),
                None => String::new(),
            },
            duration_minutes: entry.duration_minutes,
            hours: round_cents(entry.hours()),
            is_billable: entry.is_billable,
            status: entry.status,
            description: entry.description.clone(),
        })
        .collect()
}

fn name_of<T>(items: &[T], id: &str, id_of: impl Fn(&T) -> &String, name: impl Fn(&T) -> &String) -> String {
    items
        .iter()
        .find(|item| id_of(item) == id)
        .map(|item| name(item).clone())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeWeek {
    pub employee_id: String,
    pub employee_name: String,
    pub week_range: String,
    pub total_minutes: i64,
    pub billable_minutes: i64,
    pub non_billable_minutes: i64,
    pub total_hours: f64,
    pub by_status: BTreeMap<String, usize>,
}

/// One row per active employee (plus anyone else who logged time that
/// week), summing minutes between `week_start` and six days later.
pub fn weekly_summary(entries: &[TimeEntry], users: &[User], week_start: NaiveDate) -> Vec<EmployeeWeek> {
    let (from, to) = week_range(week_start);
    let label = week_label(week_start);

    users
        .iter()
        .filter_map(|user| {
            let logged: Vec<&TimeEntry> = entries
                .iter()
                .filter(|entry| entry.user_id == user.id)
                .filter(|entry| parse_date(&entry.date).is_some_and(|date| date >= from && date <= to))
                .collect();
            let listed = user.role == Role::Employee && user.status == ActiveStatus::Active;
            if logged.is_empty() && !listed {
                return None;
            }

            let total: i64 = logged.iter().map(|entry| entry.duration_minutes).sum();
            let billable: i64 = logged
                .iter()
                .filter(|entry| entry.is_billable)
                .map(|entry| entry.duration_minutes)
                .sum();
            let mut by_status = BTreeMap::new();
            for entry in &logged {
                *by_status.entry(entry.status.label().to_string()).or_insert(0) += 1;
            }

            Some(EmployeeWeek {
                employee_id: user.id.clone(),
                employee_name: user.name.clone(),
                week_range: label.clone(),
                total_minutes: total,
                billable_minutes: billable,
                non_billable_minutes: total - billable,
                total_hours: round_cents(total as f64 / 60.0),
                by_status,
            })
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalKpis {
    pub total: usize,
    pub submitted: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub overdue: usize,
    /// Hours still waiting on a decision.
    pub awaiting_hours: f64,
}

pub fn approval_kpis(approvals: &[ApprovalRequest]) -> ApprovalKpis {
    let mut kpis = ApprovalKpis {
        total: approvals.len(),
        ..ApprovalKpis::default()
    };
    for approval in approvals {
        match approval.status {
            ApprovalStatus::Submitted => kpis.submitted += 1,
            ApprovalStatus::Pending => kpis.pending += 1,
            ApprovalStatus::Approved => kpis.approved += 1,
            ApprovalStatus::Rejected => kpis.rejected += 1,
            ApprovalStatus::Overdue => kpis.overdue += 1,
        }
        if matches!(
            approval.status,
            ApprovalStatus::Submitted | ApprovalStatus::Pending | ApprovalStatus::Overdue
        ) {
            kpis.awaiting_hours += approval.total_hours;
        }
    }
    kpis.awaiting_hours = round_cents(kpis.awaiting_hours);
    kpis
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceKpis {
    pub total: usize,
    pub draft: usize,
    pub sent: usize,
    pub partial: usize,
    pub paid: usize,
    pub overdue: usize,
    pub cancelled: usize,
    /// Issued invoices only: drafts and cancelled ones are left out.
    pub total_billed: f64,
    pub total_collected: f64,
    pub outstanding: f64,
}

pub fn invoice_kpis(invoices: &[Invoice]) -> InvoiceKpis {
    let mut kpis = InvoiceKpis {
        total: invoices.len(),
        ..InvoiceKpis::default()
    };
    for invoice in invoices {
        match invoice.status {
            InvoiceStatus::Draft => kpis.draft += 1,
            InvoiceStatus::Sent => kpis.sent += 1,
            InvoiceStatus::Partial => kpis.partial += 1,
            InvoiceStatus::Paid => kpis.paid += 1,
            InvoiceStatus::Overdue => kpis.overdue += 1,
            InvoiceStatus::Cancelled => kpis.cancelled += 1,
        }
        if matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
            continue;
        }
        kpis.total_billed += invoice.total_amount;
        kpis.total_collected += invoice.paid_amount;
        kpis.outstanding += invoice.balance_amount;
    }
    kpis.total_billed = round_cents(kpis.total_billed);
    kpis.total_collected = round_cents(kpis.total_collected);
    kpis.outstanding = round_cents(kpis.outstanding);
    kpis
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUtilization {
    pub project_id: String,
    pub project_name: String,
    pub status: ProjectStatus,
    pub used_hours: f64,
    pub billable_hours: f64,
    pub billable_value: f64,
    pub budget_amount: f64,
    /// `None` for projects without a budget.
    pub budget_used_percent: Option<f64>,
    pub over_threshold: bool,
}

/// Hours and budget burn per project, priced at each member's billing rate.
pub fn project_utilization(projects: &[Project], entries: &[TimeEntry]) -> Vec<ProjectUtilization> {
    projects
        .iter()
        .map(|project| {
            let mut minutes = 0i64;
            let mut billable_minutes = 0i64;
            let mut value = 0.0;
            for entry in entries.iter().filter(|entry| entry.project_id == project.id) {
                minutes += entry.duration_minutes;
                if entry.is_billable {
                    billable_minutes += entry.duration_minutes;
                    value += entry.hours() * project.rate_for(&entry.user_id);
                }
            }
            let percent = (project.budget_amount > 0.0)
                .then(|| round_cents(value / project.budget_amount * 100.0));
            ProjectUtilization {
                project_id: project.id.clone(),
                project_name: project.name.clone(),
                status: project.status,
                used_hours: round_cents(minutes as f64 / 60.0),
                billable_hours: round_cents(billable_minutes as f64 / 60.0),
                billable_value: round_cents(value),
                budget_amount: project.budget_amount,
                budget_used_percent: percent,
                over_threshold: percent
                    .is_some_and(|p| p >= f64::from(project.alerts.budget_threshold_percent)),
            }
        })
        .collect()
}

/// Timesheet export. Fields holding a comma, quote or line break are quoted.
pub fn export_entries_csv(
    entries: &[TimeEntry],
    users: &[User],
    projects: &[Project],
    categories: &[TaskCategory],
) -> String {
    let mut lines = vec![CSV_HEADER.join(",")];
    for row in enrich_entries(entries, users, projects, categories) {
        let fields = [
            row.id,
            row.date,
            row.employee_name,
            row.project_name,
            row.category_name,
            row.duration_minutes.to_string(),
            if row.is_billable { "Yes" } else { "No" }.to_string(),
            row.status.label().to_string(),
        ];
        let escaped: Vec<String> = fields.iter().map(|field| csv_field(field)).collect();
        lines.push(escaped.join(","));
    }
    lines.join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Default file name for an export covering `range`.
pub fn csv_file_name(range: &DateRange) -> String {
    format!("timesheet_{}_{}.csv", range.start, range.end)
}

/// Entries whose date lies inside `range`, in date order.
pub fn entries_in_range(entries: &[TimeEntry], range: &DateRange) -> Vec<TimeEntry> {
    let (Some(from), Some(to)) = (parse_date(&range.start), parse_date(&range.end)) else {
        return Vec::new();
    };
    let mut selected: Vec<TimeEntry> = entries
        .iter()
        .filter(|entry| parse_date(&entry.date).is_some_and(|date| date >= from && date <= to))
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::seed;

    fn entry(id: &str, user: &str, minutes: i64, billable: bool, description: &str) -> TimeEntry {
        TimeEntry {
            id: id.into(),
            user_id: user.into(),
            project_id: "prj-1".into(),
            category_id: Some("cat-1".into()),
            date: "2024-06-03".into(),
            start_time: None,
            end_time: None,
            duration_minutes: minutes,
            is_billable: billable,
            status: EntryStatus::Draft,
            description: description.into(),
        }
    }

    #[test]
    fn two_entries_export_to_three_lines_of_eight_fields() {
        let entries = vec![
            entry("te-1", "CRED002/03-22", 480, true, ""),
            entry("te-2", "CRED003/06-22", 60, false, ""),
        ];
        let csv = export_entries_csv(&entries, &seed::users(), &seed::projects(), &seed::task_categories());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_eq!(line.split(',').count(), 8);
        }
        assert_eq!(lines[0], "ID,Date,User,Project,Category,Duration (m),Billable,Status");
        assert_eq!(
            lines[1],
            "te-1,2024-06-03,Rahul Verma,Customer Portal,Development,480,Yes,DRAFT"
        );
        assert!(lines[2].ends_with(",60,No,DRAFT"));
    }

    #[test]
    fn awkward_names_are_quoted() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Smith, J."), "\"Smith, J.\"");
        assert_eq!(csv_field("the \"big\" one"), "\"the \"\"big\"\" one\"");
    }

    #[test]
    fn missing_references_show_unknown() {
        let mut orphan = entry("te-9", "CRED099/01-24", 30, true, "");
        orphan.category_id = None;
        let rows = enrich_entries(&[orphan], &[], &seed::projects(), &[]);
        assert_eq!(rows[0].employee_name, UNKNOWN);
        assert_eq!(rows[0].project_name, "Customer Portal");
        assert_eq!(rows[0].category_name, "");
    }

    #[test]
    fn weekly_summary_splits_billable_time() {
        let start = parse_date("2024-06-03").unwrap();
        let summary = weekly_summary(&seed::time_entries(), &seed::users(), start);
        // three active employees; the admin logged nothing
        assert_eq!(summary.len(), 3);
        let rahul = summary.iter().find(|row| row.employee_id == "CRED002/03-22").unwrap();
        assert_eq!(rahul.total_minutes, 600);
        assert_eq!(rahul.billable_minutes, 480);
        assert_eq!(rahul.non_billable_minutes, 120);
        assert_eq!(rahul.by_status.get("SUBMITTED"), Some(&2));
    }

    #[test]
    fn kpis_bucket_by_status() {
        let approvals = approval_kpis(&seed::approvals());
        assert_eq!(approvals.total, 1);
        assert_eq!(approvals.submitted, 1);
        assert_eq!(approvals.awaiting_hours, 10.0);

        let invoices = invoice_kpis(&seed::invoices());
        assert_eq!(invoices.sent, 1);
        assert_eq!(invoices.total_billed, 4484.0);
        assert_eq!(invoices.outstanding, 4484.0);
    }

    #[test]
    fn utilization_prices_billable_time() {
        let rows = project_utilization(&seed::projects(), &seed::time_entries());
        let portal = rows.iter().find(|row| row.project_id == "prj-1").unwrap();
        assert_eq!(portal.used_hours, 14.0);
        assert_eq!(portal.billable_hours, 12.0);
        assert_eq!(portal.billable_value, 1140.0);
        assert_eq!(portal.budget_used_percent, Some(5.7));
        assert!(!portal.over_threshold);
    }

    #[test]
    fn range_filter_sorts_by_date() {
        let range = DateRange {
            start: "2024-06-04".into(),
            end: "2024-06-05".into(),
        };
        let ids: Vec<String> = entries_in_range(&seed::time_entries(), &range)
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(ids, ["te-2", "te-3", "te-4", "te-5"]);
    }

    #[test]
    fn export_file_is_named_after_the_range() {
        let range = DateRange {
            start: "2024-06-01".into(),
            end: "2024-06-30".into(),
        };
        assert_eq!(csv_file_name(&range), "timesheet_2024-06-01_2024-06-30.csv");
    }
}
