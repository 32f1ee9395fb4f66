use std::collections::HashMap;

use crate::domain::error::BackendError;
use crate::domain::models::*;
use crate::utils::parsing::{parse_date, week_range};

use super::Backend;

#[derive(Default)]
struct HourTotals {
    total: f64,
    billable: f64,
}

impl HourTotals {
    fn add(&mut self, entry: &TimeEntry) {
        self.total += entry.hours();
        if entry.is_billable {
            self.billable += entry.hours();
        }
    }
}

impl Backend {
    /// Rewrites every derived figure from the entries and projects.
    ///
    /// Covers project hours, client project counts and the hour totals of
    /// approvals that carry a week start. Collections are only written back
    /// when something changed.
    pub fn recompute_rollups(&self) -> Result<(), BackendError> {
        let entries = self.get_time_entries()?;

        let mut by_project: HashMap<&str, HourTotals> = HashMap::new();
        for entry in &entries {
            by_project.entry(entry.project_id.as_str()).or_default().add(entry);
        }

        let mut projects = self.get_projects()?;
        let mut projects_changed = false;
        for project in &mut projects {
            let totals = by_project.remove(project.id.as_str()).unwrap_or_default();
            let used = round_cents(totals.total);
            let billable = round_cents(totals.billable);
            if project.used_hours != used || project.billable_hours != billable {
                project.used_hours = used;
                project.billable_hours = billable;
                projects_changed = true;
            }
        }
        if projects_changed {
            self.save(&projects)?;
        }

        let mut clients = self.get_clients()?;
        let mut clients_changed = false;
        for client in &mut clients {
            let count = projects
                .iter()
                .filter(|p| p.client_id == client.id && p.status != ProjectStatus::Archived)
                .count() as u32;
            if client.total_projects != count {
                client.total_projects = count;
                clients_changed = true;
            }
        }
        if clients_changed {
            self.save(&clients)?;
        }

        let mut approvals = self.get_approvals()?;
        let mut approvals_changed = false;
        for approval in &mut approvals {
            let Some(start) = approval.week_start.as_deref().and_then(parse_date) else {
                continue;
            };
            let (start, end) = week_range(start);
            let mut totals = HourTotals::default();
            for entry in entries.iter().filter(|e| e.user_id == approval.employee_id) {
                if let Some(date) = parse_date(&entry.date) {
                    if date >= start && date <= end {
                        totals.add(entry);
                    }
                }
            }
            let total = round_cents(totals.total);
            let billable = round_cents(totals.billable);
            let non_billable = round_cents(totals.total - totals.billable);
            if approval.total_hours != total
                || approval.billable_hours != billable
                || approval.non_billable_hours != non_billable
            {
                approval.total_hours = total;
                approval.billable_hours = billable;
                approval.non_billable_hours = non_billable;
                approvals_changed = true;
            }
        }
        if approvals_changed {
            self.save(&approvals)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::seeded_backend;
    use crate::domain::seed;

    #[test]
    fn seed_rollups_agree_with_recomputation() {
        let backend = seeded_backend();
        backend.recompute_rollups().unwrap();
        assert_eq!(backend.get_projects().unwrap(), seed::projects());
        assert_eq!(backend.get_clients().unwrap(), seed::clients());
        assert_eq!(backend.get_approvals().unwrap(), seed::approvals());
    }
}
