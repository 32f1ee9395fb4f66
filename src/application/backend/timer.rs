use crate::domain::error::BackendError;
use crate::domain::models::*;
use crate::domain::timer::{StoredTimer, TimerDraft, rounded_minutes};
use crate::log;
use crate::utils::parsing::format_date;

use super::entries::daily_limit_minutes;
use super::{Backend, require};

const TIMER_KEY_PREFIX: &str = "credence_active_timer_v1_";

pub fn timer_key(user_id: &str) -> String {
    format!("{TIMER_KEY_PREFIX}{user_id}")
}

impl Backend {
    pub fn get_active_timer(&self, user_id: &str) -> Result<StoredTimer, BackendError> {
        Ok(self.read_json(&timer_key(user_id))?.unwrap_or_default())
    }

    fn save_timer(&self, user_id: &str, timer: &StoredTimer) -> Result<(), BackendError> {
        self.write_json(&timer_key(user_id), timer)
    }

    pub fn start_timer(
        &self,
        user_id: &str,
        project_id: &str,
        category_id: Option<&str>,
        description: &str,
        is_billable: bool,
    ) -> Result<StoredTimer, BackendError> {
        let current = self.get_active_timer(user_id)?;
        require(
            current.is_idle(),
            format!("{user_id} already has a {} timer", current.state_label()),
        )?;
        self.get_user(user_id)?;
        let project = self.get_project(project_id)?;
        self.check_entry_rules(&project, category_id, description)?;

        let now = self.now();
        let today = format_date(now.date_naive());
        require(
            self.logged_minutes(user_id, &today, None)? < daily_limit_minutes(&project),
            format!(
                "{user_id} already has {} hours on {today}",
                project.entry_rules.max_hours_per_day
            ),
        )?;

        let timer = StoredTimer::Running {
            draft: TimerDraft {
                user_id: user_id.to_string(),
                project_id: project_id.to_string(),
                category_id: category_id.map(str::to_string),
                description: description.to_string(),
                is_billable,
                started_at: now,
            },
            since: now,
            accumulated_seconds: 0,
        };
        self.save_timer(user_id, &timer)?;
        log!("Timer started for {} on {}", user_id, project_id);
        Ok(timer)
    }

    /// Checkpoints the running interval into the accumulator.
    pub fn pause_timer(&self, user_id: &str) -> Result<StoredTimer, BackendError> {
        let now = self.now();
        let current = self.get_active_timer(user_id)?;
        let accumulated = current.elapsed_seconds(now);
        let label = current.state_label();
        let StoredTimer::Running { draft, .. } = current else {
            return Err(BackendError::invalid(format!(
                "{user_id} has no running timer ({label})"
            )));
        };
        let timer = StoredTimer::Paused {
            draft,
            accumulated_seconds: accumulated,
        };
        self.save_timer(user_id, &timer)?;
        Ok(timer)
    }

    pub fn resume_timer(&self, user_id: &str) -> Result<StoredTimer, BackendError> {
        let current = self.get_active_timer(user_id)?;
        let label = current.state_label();
        let StoredTimer::Paused {
            draft,
            accumulated_seconds,
        } = current
        else {
            return Err(BackendError::invalid(format!(
                "{user_id} has no paused timer ({label})"
            )));
        };
        let timer = StoredTimer::Running {
            draft,
            since: self.now(),
            accumulated_seconds,
        };
        self.save_timer(user_id, &timer)?;
        Ok(timer)
    }

    /// Finalizes the timer into a draft entry and clears it. When the entry
    /// is refused the timer is left paused with its elapsed time.
    pub fn stop_timer(&self, user_id: &str) -> Result<TimeEntry, BackendError> {
        let now = self.now();
        let current = self.get_active_timer(user_id)?;
        let seconds = current.elapsed_seconds(now);
        let draft = current
            .draft()
            .cloned()
            .ok_or_else(|| BackendError::invalid(format!("{user_id} has no active timer")))?;

        let added = self.add_time_entry(TimeEntry {
            id: String::new(),
            user_id: draft.user_id.clone(),
            project_id: draft.project_id.clone(),
            category_id: draft.category_id.clone(),
            date: format_date(draft.started_at.date_naive()),
            start_time: Some(draft.started_at.format("%H:%M").to_string()),
            end_time: Some(now.format("%H:%M").to_string()),
            duration_minutes: rounded_minutes(seconds),
            is_billable: draft.is_billable,
            status: EntryStatus::Draft,
            description: draft.description.clone(),
        });
        let entry = match added {
            Ok(entry) => entry,
            Err(err) => {
                log!("Timer stop refused for {}: {}", user_id, err);
                self.save_timer(
                    user_id,
                    &StoredTimer::Paused {
                        draft,
                        accumulated_seconds: seconds,
                    },
                )?;
                return Err(err);
            }
        };
        self.store().remove(&timer_key(user_id))?;
        log!("Timer stopped for {}: {} seconds -> {}", user_id, seconds, entry.id);
        Ok(entry)
    }

    /// Replaces the notes of an active timer without touching its clock.
    pub fn describe_timer(&self, user_id: &str, description: &str) -> Result<StoredTimer, BackendError> {
        let mut timer = self.get_active_timer(user_id)?;
        let draft = timer
            .draft_mut()
            .ok_or_else(|| BackendError::invalid(format!("{user_id} has no active timer")))?;
        draft.description = description.to_string();
        self.save_timer(user_id, &timer)?;
        Ok(timer)
    }

    /// Drops an active timer without logging time.
    pub fn discard_timer(&self, user_id: &str) -> Result<(), BackendError> {
        self.store().remove(&timer_key(user_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{seeded_backend, seeded_with_clock};
    use super::*;
    use chrono::Duration;

    #[test]
    fn only_one_timer_per_user() {
        let backend = seeded_backend();
        backend
            .start_timer("CRED002/03-22", "prj-1", Some("cat-1"), "api work", true)
            .unwrap();
        assert!(
            backend
                .start_timer("CRED002/03-22", "prj-2", None, "", true)
                .is_err()
        );
    }

    #[test]
    fn illegal_moves_are_validation_errors() {
        let backend = seeded_backend();
        let user = "CRED003/06-22";
        assert!(matches!(backend.pause_timer(user), Err(BackendError::ValidationFailed(_))));
        assert!(matches!(backend.stop_timer(user), Err(BackendError::ValidationFailed(_))));
        backend.start_timer(user, "prj-2", None, "", true).unwrap();
        assert!(backend.resume_timer(user).is_err());
    }

    #[test]
    fn discard_leaves_no_entry() {
        let backend = seeded_backend();
        let before = backend.get_time_entries().unwrap().len();
        backend.start_timer("CRED004/08-22", "prj-3", None, "", false).unwrap();
        backend.discard_timer("CRED004/08-22").unwrap();
        assert!(backend.get_active_timer("CRED004/08-22").unwrap().is_idle());
        assert_eq!(backend.get_time_entries().unwrap().len(), before);
    }

    #[test]
    fn start_applies_the_entry_rules() {
        let backend = seeded_backend();
        let user = "CRED004/08-22";
        assert!(matches!(
            backend.start_timer(user, "prj-3", Some("cat-4"), "", true),
            Err(BackendError::ValidationFailed(_))
        ));
        assert!(backend.get_active_timer(user).unwrap().is_idle());

        let mut design = backend.get_task_category("cat-2").unwrap();
        design.restricted_to_projects = vec!["prj-2".into()];
        backend.update_task_category(design).unwrap();
        assert!(backend.start_timer(user, "prj-3", Some("cat-2"), "mockups", true).is_err());

        backend.start_timer(user, "prj-3", Some("cat-4"), "ticket 311", true).unwrap();
    }

    #[test]
    fn start_refuses_a_full_day() {
        let backend = seeded_backend();
        let user = "CRED004/08-22";
        let mut project = backend.get_project("prj-3").unwrap();
        project.entry_rules.max_hours_per_day = 1.0;
        backend.update_project(project).unwrap();
        let mut full = backend.get_time_entry("te-5").unwrap();
        full.id = String::new();
        full.date = "2024-06-10".into();
        full.duration_minutes = 60;
        backend.add_time_entry(full).unwrap();

        assert!(backend.start_timer(user, "prj-3", None, "", true).is_err());
    }

    #[test]
    fn refused_stop_keeps_the_time_paused() {
        let (backend, clock) = seeded_with_clock();
        let user = "CRED004/08-22";
        backend.start_timer(user, "prj-3", Some("cat-1"), "", true).unwrap();
        clock.advance(Duration::minutes(50));

        let mut project = backend.get_project("prj-3").unwrap();
        project.entry_rules.require_notes = true;
        backend.update_project(project).unwrap();

        assert!(matches!(backend.stop_timer(user), Err(BackendError::ValidationFailed(_))));
        let kept = backend.get_active_timer(user).unwrap();
        assert_eq!(kept.state_label(), "PAUSED");
        clock.advance(Duration::minutes(15));
        assert_eq!(kept.elapsed_seconds(backend.now()), 3000);

        backend.describe_timer(user, "backfill job").unwrap();
        let entry = backend.stop_timer(user).unwrap();
        assert_eq!(entry.duration_minutes, 50);
        assert_eq!(entry.description, "backfill job");
        assert!(backend.get_active_timer(user).unwrap().is_idle());
    }

    #[test]
    fn describe_needs_an_active_timer() {
        let backend = seeded_backend();
        assert!(backend.describe_timer("CRED002/03-22", "notes").is_err());
    }
}
