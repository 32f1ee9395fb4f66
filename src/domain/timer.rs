use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the finished timer will turn into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerDraft {
    pub user_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_billable: bool,
    pub started_at: DateTime<Utc>,
}

/// Persisted per user. Elapsed time is only checkpointed on pause and stop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(
    tag = "state",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum StoredTimer {
    #[default]
    Idle,
    Running {
        draft: TimerDraft,
        since: DateTime<Utc>,
        accumulated_seconds: i64,
    },
    Paused {
        draft: TimerDraft,
        accumulated_seconds: i64,
    },
}

impl StoredTimer {
    pub fn is_idle(&self) -> bool {
        matches!(self, StoredTimer::Idle)
    }

    pub fn draft(&self) -> Option<&TimerDraft> {
        match self {
            StoredTimer::Idle => None,
            StoredTimer::Running { draft, .. } | StoredTimer::Paused { draft, .. } => Some(draft),
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut TimerDraft> {
        match self {
            StoredTimer::Idle => None,
            StoredTimer::Running { draft, .. } | StoredTimer::Paused { draft, .. } => Some(draft),
        }
    }

    /// Seconds counted so far; a running interval is measured up to `now`.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self {
            StoredTimer::Idle => 0,
            StoredTimer::Paused {
                accumulated_seconds,
                ..
            } => *accumulated_seconds,
            StoredTimer::Running {
                since,
                accumulated_seconds,
                ..
            } => accumulated_seconds + (now - *since).num_seconds().max(0),
        }
    }

    pub fn state_label(&self) -> &'static str {
        match self {
            StoredTimer::Idle => "IDLE",
            StoredTimer::Running { .. } => "RUNNING",
            StoredTimer::Paused { .. } => "PAUSED",
        }
    }
}

/// Whole minutes for a finished timer, rounded to the nearest minute, never zero.
pub fn rounded_minutes(seconds: i64) -> i64 {
    ((seconds as f64 / 60.0).round() as i64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn draft(at: DateTime<Utc>) -> TimerDraft {
        TimerDraft {
            user_id: "u1".into(),
            project_id: "p1".into(),
            category_id: None,
            description: String::new(),
            is_billable: true,
            started_at: at,
        }
    }

    #[test]
    fn running_timer_adds_live_interval() {
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let timer = StoredTimer::Running {
            draft: draft(start),
            since: start,
            accumulated_seconds: 600,
        };
        assert_eq!(timer.elapsed_seconds(start + Duration::minutes(5)), 900);
    }

    #[test]
    fn serialized_state_is_tagged() {
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let timer = StoredTimer::Paused {
            draft: draft(start),
            accumulated_seconds: 42,
        };
        let value = serde_json::to_value(&timer).unwrap();
        assert_eq!(value["state"], "PAUSED");
        assert_eq!(value["accumulatedSeconds"], 42);
        let back: StoredTimer = serde_json::from_value(value).unwrap();
        assert_eq!(back, timer);
    }

    #[test]
    fn short_sessions_count_as_one_minute() {
        assert_eq!(rounded_minutes(10), 1);
        assert_eq!(rounded_minutes(89), 1);
        assert_eq!(rounded_minutes(90), 2);
    }
}
