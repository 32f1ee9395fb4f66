use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::models::*;
use crate::domain::seed;
use crate::utils::parsing::parse_date;

/// An entity stored as one element of a keyed JSON array.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const KEY: &'static str;
    const ENTITY: &'static str;
    const ID_PREFIX: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    fn seed() -> Vec<Self> {
        Vec::new()
    }

    /// Next id in sequence; never collides with an existing one.
    fn generate_id(existing: &[Self], _now: DateTime<Utc>) -> String {
        let next = existing
            .iter()
            .filter_map(|item| numeric_suffix(item.id(), Self::ID_PREFIX))
            .max()
            .unwrap_or(0)
            + 1;
        format!("{}{}", Self::ID_PREFIX, next)
    }
}

pub(crate) fn numeric_suffix(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}

macro_rules! record {
    ($ty:ty, $key:expr, $entity:expr, $prefix:expr) => {
        record!($ty, $key, $entity, $prefix, Vec::new);
    };
    ($ty:ty, $key:expr, $entity:expr, $prefix:expr, $seed:path) => {
        impl Record for $ty {
            const KEY: &'static str = $key;
            const ENTITY: &'static str = $entity;
            const ID_PREFIX: &'static str = $prefix;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn seed() -> Vec<Self> {
                $seed()
            }
        }
    };
}

record!(Project, "credence_projects_v1", "project", "prj-", seed::projects);
record!(Client, "credence_clients_v1", "client", "cl-", seed::clients);
record!(TaskCategory, "credence_task_categories_v1", "task category", "cat-", seed::task_categories);
record!(Task, "credence_tasks_v1", "task", "tsk-");
record!(TimeEntry, "credence_entries_v1", "time entry", "te-", seed::time_entries);
record!(ApprovalRequest, "credence_approvals_v1", "approval", "apr-", seed::approvals);
record!(Invoice, "credence_invoices_v1", "invoice", "inv-", seed::invoices);
record!(PayrollRun, "credence_payroll_runs_v1", "payroll run", "pr-");
record!(PayrollRecord, "credence_payroll_records_v1", "payroll record", "prr-");
record!(AvailabilityEvent, "credence_availability_v1", "availability event", "av-");
record!(UserAssignment, "credence_user_assignments_v1", "user assignment", "ua-");
record!(Notification, "credence_notifications", "notification", "ntf-");

// Users carry business ids: CRED<seq>/<joining MM-YY>.
impl Record for User {
    const KEY: &'static str = "credence_users_v2";
    const ENTITY: &'static str = "user";
    const ID_PREFIX: &'static str = "CRED";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn seed() -> Vec<Self> {
        seed::users()
    }

    fn generate_id(existing: &[Self], now: DateTime<Utc>) -> String {
        let next = existing
            .iter()
            .filter_map(|user| {
                let rest = user.id.strip_prefix(Self::ID_PREFIX)?;
                rest.split('/').next()?.parse::<u64>().ok()
            })
            .max()
            .unwrap_or(0)
            + 1;
        format!("{}{:03}/{:02}-{:02}", Self::ID_PREFIX, next, now.month(), now.year() % 100)
    }
}

/// Business id for a user joining on `joining_date` (or `now` when absent).
pub(crate) fn user_id_for(existing: &[User], joining_date: Option<&str>, now: DateTime<Utc>) -> String {
    let stamp = joining_date
        .and_then(parse_date)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    User::generate_id(existing, stamp)
}
