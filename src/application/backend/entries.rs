use chrono::NaiveTime;

use crate::domain::error::BackendError;
use crate::domain::models::*;
use crate::utils::parsing::{normalize_date, parse_date, range_bounds};

use super::{Backend, require};

impl Backend {
    pub fn get_time_entries(&self) -> Result<Vec<TimeEntry>, BackendError> {
        self.list()
    }

    pub fn get_time_entry(&self, id: &str) -> Result<TimeEntry, BackendError> {
        self.find(id)
    }

    /// Entries of one user, optionally limited to an inclusive date range.
    pub fn get_user_entries(&self, user_id: &str, range: Option<&DateRange>) -> Result<Vec<TimeEntry>, BackendError> {
        let bounds = match range {
            Some(range) => Some(
                range_bounds(range)
                    .ok_or_else(|| BackendError::invalid(format!("invalid range: {}", range.label())))?,
            ),
            None => None,
        };
        Ok(self
            .get_time_entries()?
            .into_iter()
            .filter(|entry| entry.user_id == user_id)
            .filter(|entry| match (bounds, parse_date(&entry.date)) {
                (None, _) => true,
                (Some((start, end)), Some(date)) => date >= start && date <= end,
                (Some(_), None) => false,
            })
            .collect())
    }

    pub fn add_time_entry(&self, mut entry: TimeEntry) -> Result<TimeEntry, BackendError> {
        self.validate_entry(&mut entry, None)?;
        let entry = self.insert(entry)?;
        self.recompute_rollups()?;
        Ok(entry)
    }

    pub fn update_time_entry(&self, mut entry: TimeEntry) -> Result<TimeEntry, BackendError> {
        let current = self.get_time_entry(&entry.id)?;
        require(
            current.status != EntryStatus::Locked,
            format!("entry {} is locked", entry.id),
        )?;
        require(
            current.status.can_move_to(entry.status),
            format!(
                "entry {} cannot move from {} to {}",
                entry.id,
                current.status.label(),
                entry.status.label()
            ),
        )?;
        let own_id = entry.id.clone();
        self.validate_entry(&mut entry, Some(&own_id))?;
        let entry = self.replace(entry)?;
        self.recompute_rollups()?;
        Ok(entry)
    }

    pub fn delete_time_entry(&self, id: &str) -> Result<TimeEntry, BackendError> {
        let current = self.get_time_entry(id)?;
        require(
            current.status != EntryStatus::Locked,
            format!("entry {id} is locked"),
        )?;
        let removed = self.remove(id)?;
        self.recompute_rollups()?;
        Ok(removed)
    }

    pub fn set_entry_status(&self, id: &str, status: EntryStatus) -> Result<TimeEntry, BackendError> {
        let mut entry = self.get_time_entry(id)?;
        require(
            entry.status.can_move_to(status),
            format!(
                "entry {id} cannot move from {} to {}",
                entry.status.label(),
                status.label()
            ),
        )?;
        entry.status = status;
        self.replace(entry)
    }

    // Moves every matching entry in one write; used by approval decisions.
    pub(crate) fn transition_entries<F>(&self, mut matches: F, from: &[EntryStatus], to: EntryStatus) -> Result<usize, BackendError>
    where
        F: FnMut(&TimeEntry) -> bool,
    {
        let mut entries = self.get_time_entries()?;
        let mut moved = 0;
        for entry in entries.iter_mut() {
            if from.contains(&entry.status) && entry.status.can_move_to(to) && matches(&*entry) {
                entry.status = to;
                moved += 1;
            }
        }
        if moved > 0 {
            self.save(&entries)?;
        }
        Ok(moved)
    }

    fn validate_entry(&self, entry: &mut TimeEntry, own_id: Option<&str>) -> Result<(), BackendError> {
        require(entry.duration_minutes > 0, "duration must be positive")?;
        entry.date = normalize_date(&entry.date)
            .ok_or_else(|| BackendError::invalid(format!("invalid date: {}", entry.date)))?;
        for time in [&entry.start_time, &entry.end_time].into_iter().flatten() {
            require(
                NaiveTime::parse_from_str(time, "%H:%M").is_ok(),
                format!("invalid time: {time}"),
            )?;
        }

        self.get_user(&entry.user_id)
            .map_err(|_| BackendError::invalid(format!("unknown user: {}", entry.user_id)))?;
        let project = self
            .get_project(&entry.project_id)
            .map_err(|_| BackendError::invalid(format!("unknown project: {}", entry.project_id)))?;
        self.check_entry_rules(&project, entry.category_id.as_deref(), &entry.description)?;

        if !project.entry_rules.allow_future_entries {
            let today = self.now().date_naive();
            let future = parse_date(&entry.date).is_some_and(|date| date > today);
            require(!future, "future entries are not allowed on this project")?;
        }

        let logged = self.logged_minutes(&entry.user_id, &entry.date, own_id)?;
        require(
            logged + entry.duration_minutes <= daily_limit_minutes(&project),
            format!(
                "{} would exceed {} hours on {}",
                entry.user_id, project.entry_rules.max_hours_per_day, entry.date
            ),
        )
    }

    /// Project and category rules that hold regardless of duration or date.
    pub(crate) fn check_entry_rules(
        &self,
        project: &Project,
        category_id: Option<&str>,
        description: &str,
    ) -> Result<(), BackendError> {
        require(
            project.status != ProjectStatus::Archived,
            format!("project {} is archived", project.id),
        )?;
        let notes_missing = description.trim().is_empty();
        require(
            !(project.entry_rules.require_notes && notes_missing),
            format!("project {} requires notes", project.id),
        )?;
        if let Some(category_id) = category_id {
            let category = self
                .get_task_category(category_id)
                .map_err(|_| BackendError::invalid(format!("unknown category: {category_id}")))?;
            require(
                !(category.is_notes_required && notes_missing),
                format!("category {} requires notes", category.name),
            )?;
            require(
                category.restricted_to_projects.is_empty()
                    || category.restricted_to_projects.iter().any(|id| *id == project.id),
                format!("category {} is not available on {}", category.name, project.id),
            )?;
        }
        Ok(())
    }

    /// Minutes `user_id` already has on `date`, skipping the entry being edited.
    pub(crate) fn logged_minutes(&self, user_id: &str, date: &str, own_id: Option<&str>) -> Result<i64, BackendError> {
        Ok(self
            .get_time_entries()?
            .iter()
            .filter(|other| Some(other.id.as_str()) != own_id)
            .filter(|other| other.user_id == user_id && other.date == date)
            .map(|other| other.duration_minutes)
            .sum())
    }
}

pub(crate) fn daily_limit_minutes(project: &Project) -> i64 {
    (project.entry_rules.max_hours_per_day * 60.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::super::test_support::seeded_backend;
    use super::*;

    fn entry(minutes: i64) -> TimeEntry {
        TimeEntry {
            id: String::new(),
            user_id: "CRED004/08-22".into(),
            project_id: "prj-3".into(),
            category_id: Some("cat-1".into()),
            date: "2024/06/07".into(),
            start_time: None,
            end_time: None,
            duration_minutes: minutes,
            is_billable: true,
            status: EntryStatus::Draft,
            description: "ingest job".into(),
        }
    }

    #[test]
    fn adding_entry_updates_project_hours() {
        let backend = seeded_backend();
        let added = backend.add_time_entry(entry(90)).unwrap();
        assert_eq!(added.id, "te-7");
        assert_eq!(added.date, "2024-06-07");
        let project = backend.get_project("prj-3").unwrap();
        assert_eq!(project.used_hours, 6.5);
        assert_eq!(project.billable_hours, 6.5);
    }

    #[test]
    fn locked_entries_are_frozen() {
        let backend = seeded_backend();
        let added = backend.add_time_entry(entry(30)).unwrap();
        backend.set_entry_status(&added.id, EntryStatus::Approved).unwrap();
        assert!(backend.set_entry_status(&added.id, EntryStatus::Rejected).is_err());
        backend.set_entry_status(&added.id, EntryStatus::Locked).unwrap();
        assert!(backend.delete_time_entry(&added.id).is_err());
        let mut edited = backend.get_time_entry(&added.id).unwrap();
        edited.duration_minutes = 45;
        assert!(matches!(
            backend.update_time_entry(edited),
            Err(BackendError::ValidationFailed(_))
        ));
    }

    #[test]
    fn notes_required_by_category() {
        let backend = seeded_backend();
        let mut support = entry(30);
        support.category_id = Some("cat-4".into());
        support.description = "  ".into();
        assert!(backend.add_time_entry(support).is_err());
    }

    #[test]
    fn daily_limit_is_enforced() {
        let backend = seeded_backend();
        let mut project = backend.get_project("prj-3").unwrap();
        project.entry_rules.max_hours_per_day = 8.0;
        backend.update_project(project).unwrap();
        backend.add_time_entry(entry(400)).unwrap();
        assert!(backend.add_time_entry(entry(100)).is_err());
        backend.add_time_entry(entry(80)).unwrap();
    }

    #[test]
    fn archived_project_rejects_entries() {
        let backend = seeded_backend();
        backend.delete_project("prj-3").unwrap();
        assert!(backend.add_time_entry(entry(30)).is_err());
    }

    #[test]
    fn range_filter_on_user_entries() {
        let backend = seeded_backend();
        let range = DateRange {
            start: "2024-06-05".into(),
            end: "2024-06-05".into(),
        };
        let entries = backend.get_user_entries("CRED004/08-22", Some(&range)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "te-5");
    }
}
