//! Payroll runs over logged time.
//!
//! Hours come from the time entries dated inside the pay period. Each
//! employee is priced independently, so the per-employee work is spread
//! across threads with rayon before the run is assembled and persisted.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::error::BackendError;
use crate::domain::models::*;
use crate::domain::settings::PayrollSettings;
use crate::log;
use crate::utils::parsing::{parse_date, range_bounds};

use super::records::numeric_suffix;
use super::{Backend, Record, require};

/// Rate used for employees without an hourly cost rate.
pub const DEFAULT_HOURLY_RATE: f64 = 25.0;

#[derive(Clone, Debug, PartialEq)]
pub struct PayrollOptions {
    pub default_rate: f64,
    pub approved_only: bool,
    /// Hours per period after which the overtime multiplier applies.
    pub overtime_threshold_hours: Option<f64>,
    pub overtime_multiplier: f64,
}

impl Default for PayrollOptions {
    fn default() -> Self {
        Self {
            default_rate: DEFAULT_HOURLY_RATE,
            approved_only: false,
            overtime_threshold_hours: None,
            overtime_multiplier: 1.5,
        }
    }
}

impl From<&PayrollSettings> for PayrollOptions {
    fn from(settings: &PayrollSettings) -> Self {
        Self {
            default_rate: settings.default_hourly_rate,
            approved_only: settings.approved_hours_only,
            overtime_threshold_hours: settings
                .overtime_enabled
                .then_some(settings.overtime_threshold_hours),
            overtime_multiplier: settings.overtime_multiplier,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollResult {
    pub run: PayrollRun,
    pub records: Vec<PayrollRecord>,
}

impl Backend {
    pub fn get_payroll_runs(&self) -> Result<Vec<PayrollRun>, BackendError> {
        self.list()
    }

    pub fn get_payroll_records(&self, run_id: &str) -> Result<Vec<PayrollRecord>, BackendError> {
        Ok(self
            .list::<PayrollRecord>()?
            .into_iter()
            .filter(|record| record.run_id == run_id)
            .collect())
    }

    pub fn finalize_payroll_run(&self, run_id: &str) -> Result<PayrollRun, BackendError> {
        let mut run: PayrollRun = self.find(run_id)?;
        run.status = PayrollStatus::Finalized;
        self.replace(run)
    }

    /// Draft runs can be thrown away together with their records.
    pub fn delete_payroll_run(&self, run_id: &str) -> Result<PayrollRun, BackendError> {
        let run: PayrollRun = self.find(run_id)?;
        require(
            run.status == PayrollStatus::Draft,
            format!("payroll run {run_id} is finalized"),
        )?;
        let records: Vec<PayrollRecord> = self
            .list::<PayrollRecord>()?
            .into_iter()
            .filter(|record| record.run_id != run_id)
            .collect();
        self.save(&records)?;
        self.remove(run_id)
    }

    pub fn calculate_payroll(&self, period: &DateRange, options: &PayrollOptions) -> Result<PayrollResult, BackendError> {
        let (start, end) = range_bounds(period)
            .ok_or_else(|| BackendError::invalid(format!("invalid pay period: {}", period.label())))?;
        require(options.default_rate >= 0.0, "default rate cannot be negative")?;
        require(options.overtime_multiplier >= 1.0, "overtime multiplier must be at least 1")?;

        let employees: Vec<User> = self
            .get_users()?
            .into_iter()
            .filter(|user| user.role == Role::Employee && user.status == ActiveStatus::Active)
            .collect();

        let entries = self.get_time_entries()?;
        let mut by_user: HashMap<&str, Vec<&TimeEntry>> = HashMap::new();
        for entry in &entries {
            if options.approved_only
                && !matches!(entry.status, EntryStatus::Approved | EntryStatus::Locked)
            {
                continue;
            }
            if parse_date(&entry.date).is_some_and(|date| date >= start && date <= end) {
                by_user.entry(entry.user_id.as_str()).or_default().push(entry);
            }
        }

        let mut records: Vec<PayrollRecord> = employees
            .par_iter()
            .map(|employee| {
                let logged = by_user.get(employee.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                price_employee(employee, logged, options)
            })
            .collect();

        let mut runs = self.get_payroll_runs()?;
        let run_id = PayrollRun::generate_id(&runs, self.now());
        let mut all_records = self.list::<PayrollRecord>()?;
        let mut next = all_records
            .iter()
            .filter_map(|record| numeric_suffix(&record.id, PayrollRecord::ID_PREFIX))
            .max()
            .unwrap_or(0);
        for record in records.iter_mut() {
            next += 1;
            record.id = format!("{}{}", PayrollRecord::ID_PREFIX, next);
            record.run_id = run_id.clone();
        }

        let run = PayrollRun {
            id: run_id,
            period: period.label(),
            period_start: period.start.clone(),
            period_end: period.end.clone(),
            created_at: self.now(),
            employee_count: records.len(),
            total_approved_hours: round_cents(records.iter().map(|r| r.total_hours).sum()),
            total_payable: round_cents(records.iter().map(|r| r.total_payable).sum()),
            status: PayrollStatus::Draft,
        };

        runs.push(run.clone());
        all_records.extend(records.iter().cloned());
        self.save(&runs)?;
        self.save(&all_records)?;
        self.audit(
            "CREATE",
            PayrollRun::ENTITY,
            &run.id,
            &format!("{} employees, {:.2} payable", run.employee_count, run.total_payable),
        );
        log!(
            "Payroll {} for {}: {} employees, {:.2} hours, {:.2} payable",
            run.id,
            run.period,
            run.employee_count,
            run.total_approved_hours,
            run.total_payable
        );

        Ok(PayrollResult { run, records })
    }
}

fn price_employee(employee: &User, entries: &[&TimeEntry], options: &PayrollOptions) -> PayrollRecord {
    let minutes: i64 = entries.iter().map(|entry| entry.duration_minutes).sum();
    let billable_minutes: i64 = entries
        .iter()
        .filter(|entry| entry.is_billable)
        .map(|entry| entry.duration_minutes)
        .sum();
    let total_hours = minutes as f64 / 60.0;
    let rate = employee.hourly_cost_rate.unwrap_or(options.default_rate);

    let overtime_hours = match options.overtime_threshold_hours {
        Some(threshold) if total_hours > threshold => total_hours - threshold,
        _ => 0.0,
    };
    let regular_hours = total_hours - overtime_hours;
    let base_pay = round_cents(regular_hours * rate);
    let overtime_pay = round_cents(overtime_hours * rate * options.overtime_multiplier);

    PayrollRecord {
        id: String::new(),
        run_id: String::new(),
        employee_id: employee.id.clone(),
        employee_name: employee.name.clone(),
        total_hours: round_cents(total_hours),
        billable_hours: round_cents(billable_minutes as f64 / 60.0),
        non_billable_hours: round_cents((minutes - billable_minutes) as f64 / 60.0),
        hourly_rate: rate,
        base_pay,
        overtime_hours: round_cents(overtime_hours),
        overtime_pay,
        total_payable: round_cents(base_pay + overtime_pay),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::seeded_backend;
    use super::*;

    fn june() -> DateRange {
        DateRange {
            start: "2024-06-01".into(),
            end: "2024-06-30".into(),
        }
    }

    #[test]
    fn seeded_run_uses_rates_and_default() {
        let backend = seeded_backend();
        let result = backend.calculate_payroll(&june(), &PayrollOptions::default()).unwrap();
        assert_eq!(result.run.employee_count, 3);
        let karan = result
            .records
            .iter()
            .find(|r| r.employee_id == "CRED004/08-22")
            .unwrap();
        assert_eq!(karan.hourly_rate, DEFAULT_HOURLY_RATE);
        assert_eq!(karan.total_hours, 6.0);
        assert_eq!(karan.base_pay, 150.0);
        // 10h at 45, 10h at 38, 6h at 25
        assert_eq!(result.run.total_payable, 450.0 + 380.0 + 150.0);
        assert_eq!(result.run.total_approved_hours, 26.0);
    }

    #[test]
    fn entries_outside_the_period_are_ignored() {
        let backend = seeded_backend();
        let period = DateRange {
            start: "2024-06-05".into(),
            end: "2024-06-05".into(),
        };
        let result = backend.calculate_payroll(&period, &PayrollOptions::default()).unwrap();
        assert_eq!(result.run.total_approved_hours, 9.0);
    }

    #[test]
    fn overtime_above_threshold() {
        let backend = seeded_backend();
        let options = PayrollOptions {
            overtime_threshold_hours: Some(8.0),
            ..PayrollOptions::default()
        };
        let result = backend.calculate_payroll(&june(), &options).unwrap();
        let rahul = result
            .records
            .iter()
            .find(|r| r.employee_id == "CRED002/03-22")
            .unwrap();
        assert_eq!(rahul.base_pay, 360.0);
        assert_eq!(rahul.overtime_pay, 135.0);
        assert_eq!(rahul.total_payable, 495.0);
    }

    #[test]
    fn finalized_runs_cannot_be_deleted() {
        let backend = seeded_backend();
        let run = backend.calculate_payroll(&june(), &PayrollOptions::default()).unwrap().run;
        assert_eq!(backend.get_payroll_records(&run.id).unwrap().len(), 3);
        backend.finalize_payroll_run(&run.id).unwrap();
        assert!(backend.delete_payroll_run(&run.id).is_err());
    }

    #[test]
    fn approved_only_skips_unapproved_time() {
        let backend = seeded_backend();
        backend.approve_request("apr-1").unwrap();
        let options = PayrollOptions {
            approved_only: true,
            ..PayrollOptions::default()
        };
        let result = backend.calculate_payroll(&june(), &options).unwrap();
        assert_eq!(result.run.total_approved_hours, 10.0);
    }
}
