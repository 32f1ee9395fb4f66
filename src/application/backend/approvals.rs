use chrono::{Duration, NaiveDate};

use crate::domain::error::BackendError;
use crate::domain::models::*;
use crate::utils::parsing::{format_date, parse_date, week_label, week_range};

use super::{Backend, require};

impl Backend {
    pub fn get_approvals(&self) -> Result<Vec<ApprovalRequest>, BackendError> {
        self.list()
    }

    pub fn get_approval(&self, id: &str) -> Result<ApprovalRequest, BackendError> {
        self.find(id)
    }

    /// Hour totals of requests with a week start are derived from entries.
    pub fn add_approval(&self, mut approval: ApprovalRequest) -> Result<ApprovalRequest, BackendError> {
        self.prepare_approval(&mut approval)?;
        let approval = self.insert(approval)?;
        self.recompute_rollups()?;
        self.get_approval(&approval.id)
    }

    pub fn update_approval(&self, mut approval: ApprovalRequest) -> Result<ApprovalRequest, BackendError> {
        self.prepare_approval(&mut approval)?;
        let approval = self.replace(approval)?;
        self.recompute_rollups()?;
        self.get_approval(&approval.id)
    }

    pub fn delete_approval(&self, id: &str) -> Result<ApprovalRequest, BackendError> {
        self.remove(id)
    }

    fn prepare_approval(&self, approval: &mut ApprovalRequest) -> Result<(), BackendError> {
        let employee = self
            .get_user(&approval.employee_id)
            .map_err(|_| BackendError::invalid(format!("unknown employee: {}", approval.employee_id)))?;
        approval.employee_name = employee.name;
        if let Some(raw) = approval.week_start.clone() {
            let start = parse_date(&raw)
                .ok_or_else(|| BackendError::invalid(format!("invalid week start: {raw}")))?;
            approval.week_start = Some(format_date(start));
            approval.week_range = week_label(start);
        }
        Ok(())
    }

    /// Submits one employee's week: creates (or refreshes) the request and
    /// moves the week's draft and rejected entries to SUBMITTED.
    pub fn submit_week(&self, user_id: &str, week_start: &str) -> Result<ApprovalRequest, BackendError> {
        let start = parse_date(week_start)
            .ok_or_else(|| BackendError::invalid(format!("invalid week start: {week_start}")))?;
        let user = self.get_user(user_id)?;
        let (from, to) = week_range(start);
        let week_entries = self.get_user_entries(
            user_id,
            Some(&DateRange {
                start: format_date(from),
                end: format_date(to),
            }),
        )?;
        require(
            !week_entries.is_empty(),
            format!("{} has no entries for the week of {}", user.name, format_date(start)),
        )?;

        let week_key = format_date(start);
        let existing = self.get_approvals()?.into_iter().find(|approval| {
            approval.employee_id == user_id && approval.week_start.as_deref() == Some(week_key.as_str())
        });
        if let Some(approval) = &existing {
            require(
                approval.status != ApprovalStatus::Approved,
                format!("week of {week_key} is already approved"),
            )?;
        }

        self.transition_entries(
            |entry| in_week(entry, user_id, from, to),
            &[EntryStatus::Draft, EntryStatus::Rejected],
            EntryStatus::Submitted,
        )?;

        match existing {
            Some(mut approval) => {
                approval.status = ApprovalStatus::Submitted;
                approval.submitted_at = Some(self.now());
                approval.comment = None;
                self.update_approval(approval)
            }
            None => self.add_approval(ApprovalRequest {
                id: String::new(),
                employee_id: user_id.to_string(),
                employee_name: user.name,
                week_start: Some(week_key),
                week_range: String::new(),
                total_hours: 0.0,
                billable_hours: 0.0,
                non_billable_hours: 0.0,
                status: ApprovalStatus::Submitted,
                submitted_at: Some(self.now()),
                comment: None,
            }),
        }
    }

    pub fn approve_request(&self, id: &str) -> Result<ApprovalRequest, BackendError> {
        self.decide(id, ApprovalStatus::Approved, EntryStatus::Approved, None)
    }

    pub fn reject_request(&self, id: &str, comment: &str) -> Result<ApprovalRequest, BackendError> {
        require(!comment.trim().is_empty(), "a rejection needs a comment")?;
        self.decide(id, ApprovalStatus::Rejected, EntryStatus::Rejected, Some(comment))
    }

    fn decide(
        &self,
        id: &str,
        decision: ApprovalStatus,
        entry_status: EntryStatus,
        comment: Option<&str>,
    ) -> Result<ApprovalRequest, BackendError> {
        let mut approval = self.get_approval(id)?;
        require(
            matches!(
                approval.status,
                ApprovalStatus::Submitted | ApprovalStatus::Pending | ApprovalStatus::Overdue
            ),
            format!("approval {id} was already decided"),
        )?;
        if let Some(start) = approval.week_start.as_deref().and_then(parse_date) {
            let (from, to) = week_range(start);
            let employee = approval.employee_id.clone();
            self.transition_entries(
                |entry| in_week(entry, &employee, from, to),
                &[EntryStatus::Submitted],
                entry_status,
            )?;
        }
        approval.status = decision;
        approval.comment = comment.map(str::to_string);
        let approval = self.replace(approval)?;
        if let Ok(employee) = self.get_user(&approval.employee_id) {
            let title = match decision {
                ApprovalStatus::Approved => "Timesheet approved",
                _ => "Timesheet rejected",
            };
            self.notify(&employee.id, title, &approval.week_range)?;
        }
        Ok(approval)
    }

    /// Flags undecided requests whose week ended more than `grace_days` ago.
    pub fn flag_overdue_approvals(&self, today: NaiveDate, grace_days: i64) -> Result<usize, BackendError> {
        let mut approvals = self.get_approvals()?;
        let mut flagged = 0;
        for approval in approvals.iter_mut() {
            if !matches!(approval.status, ApprovalStatus::Submitted | ApprovalStatus::Pending) {
                continue;
            }
            let Some(start) = approval.week_start.as_deref().and_then(parse_date) else {
                continue;
            };
            let (_, end) = week_range(start);
            if end + Duration::days(grace_days) < today {
                approval.status = ApprovalStatus::Overdue;
                flagged += 1;
            }
        }
        if flagged > 0 {
            self.save(&approvals)?;
        }
        Ok(flagged)
    }
}

fn in_week(entry: &TimeEntry, user_id: &str, from: NaiveDate, to: NaiveDate) -> bool {
    entry.user_id == user_id
        && parse_date(&entry.date).is_some_and(|date| date >= from && date <= to)
}
