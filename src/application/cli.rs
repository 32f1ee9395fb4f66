use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc, Weekday};
use serde::Serialize;
use serde_json::Value;
use toon::{Delimiter, EncodeOptions};

use crate::application::aggregators::{
    ApprovalKpis, InvoiceKpis, approval_kpis, csv_file_name, enrich_entries, entries_in_range,
    export_entries_csv, invoice_kpis, project_utilization, weekly_summary,
};
use crate::application::backend::{Backend, BackupSnapshot, InvoiceTerms, PayrollOptions, backup_due};
use crate::application::settings_store::{SettingsRemote, SettingsStore};
use crate::domain::config::AppConfig;
use crate::domain::models::*;
use crate::domain::settings::SettingsSection;
use crate::domain::timer::StoredTimer;
use crate::infrastructure::api_client::ApiClient;
use crate::infrastructure::config::{load_config, resolve_data_dir};
use crate::infrastructure::store::{FileStore, KeyValueStore};
use crate::log;
use crate::utils::parsing::{parse_date, parse_date_range, parse_weekday, week_start_of};

const RANGE_ARG: &str = "<MONTH|WEEK|LAST-MONTH|YYYY-MM-DD..YYYY-MM-DD>";

const CLI_HELP: &str = "  list <users|projects|clients|categories|tasks|entries|approvals|invoices|payroll-runs|payroll-records|availability|assignments|notifications|audit> [--range <RANGE>] [--user <ID>] [--run <ID>]
  summary [--week <YYYY-MM-DD>]
  kpis
  utilization
  export-csv [--range <RANGE>] [--out <FILE> | --save]
  payroll run [--range <RANGE>] [--rate <N>] [--approved-only] [--overtime]
  payroll finalize|delete <RUN_ID>
  timer start --user <ID> --project <ID> [--category <ID>] [--description <TEXT>] [--billable <true|false>]
  timer pause|resume|stop|discard|status --user <ID>
  timer note --user <ID> --description <TEXT>
  add-entry --user <ID> --project <ID> --minutes <N> [--date <YYYY-MM-DD>] [--category <ID>] [--description <TEXT>] [--billable <true|false>]
  entry-status <ENTRY_ID> <DRAFT|SUBMITTED|APPROVED|REJECTED|LOCKED>
  project archive|restore <PROJECT_ID>
  approval submit --user <ID> --week <YYYY-MM-DD>
  approval approve <ID> | approval reject <ID> --comment <TEXT> | approval flag-overdue [--grace <DAYS>]
  invoice pay <ID> --amount <N> [--date <YYYY-MM-DD>] [--method <TEXT>] [--reference <TEXT>]
  invoice from-entries --project <ID> [--range <RANGE>] [--tax <PERCENT>] [--terms <DAYS>]
  invoice cancel <ID> | invoice flag-overdue
  settings get [--section <NAME>] | settings set-section <NAME> <JSON>
  backup create [--out <FILE>] | backup restore <FILE> | backup due
  sync

Every command accepts --pretty or --toon.";

const LIST_HELP: &str = "Usage:\n  list <users|projects|clients|categories|tasks|entries|approvals|invoices|payroll-runs|payroll-records|availability|assignments|notifications|audit> [--range <RANGE>] [--user <ID>] [--run <ID>]";

const PAYROLL_HELP: &str = "Usage:\n  payroll run [--range <RANGE>] [--rate <N>] [--approved-only] [--overtime]\n  payroll finalize <RUN_ID>\n  payroll delete <RUN_ID>";

const TIMER_HELP: &str = "Usage:\n  timer start --user <ID> --project <ID> [--category <ID>] [--description <TEXT>] [--billable <true|false>]\n  timer pause|resume|stop|discard|status --user <ID>\n  timer note --user <ID> --description <TEXT>";

const ADD_ENTRY_HELP: &str = "Usage:\n  add-entry --user <ID> --project <ID> --minutes <N> [--date <YYYY-MM-DD>] [--category <ID>] [--description <TEXT>] [--billable <true|false>]";

const APPROVAL_HELP: &str = "Usage:\n  approval submit --user <ID> --week <YYYY-MM-DD>\n  approval approve <ID>\n  approval reject <ID> --comment <TEXT>\n  approval flag-overdue [--grace <DAYS>]";

const INVOICE_HELP: &str = "Usage:\n  invoice pay <ID> --amount <N> [--date <YYYY-MM-DD>] [--method <TEXT>] [--reference <TEXT>]\n  invoice from-entries --project <ID> [--range <RANGE>] [--tax <PERCENT>] [--terms <DAYS>]\n  invoice cancel <ID>\n  invoice flag-overdue";

const SETTINGS_HELP: &str = "Usage:\n  settings get [--section <NAME>]\n  settings set-section <NAME> <JSON>";

const BACKUP_HELP: &str = "Usage:\n  backup create [--out <FILE>]\n  backup restore <FILE>\n  backup due";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Compact,
    Pretty,
    Toon,
}

struct Services {
    config: AppConfig,
    backend: Backend,
    settings: SettingsStore,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KpisOutput {
    approvals: ApprovalKpis,
    invoices: InvoiceKpis,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimerStatusOutput {
    state: &'static str,
    elapsed_seconds: i64,
    timer: StoredTimer,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportOutput {
    ok: bool,
    path: String,
    rows: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupOutput {
    created_at: String,
    keys: usize,
    path: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountOutput {
    action: &'static str,
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncOutput {
    users: usize,
    clients: usize,
    projects: usize,
    task_categories: usize,
    user_assignments: usize,
}

pub fn run_cli(args: &[String]) -> Result<(), String> {
    if args.is_empty() || is_help(args[0].as_str()) {
        println!("Commands:\n{CLI_HELP}");
        return Ok(());
    }

    let rest = &args[1..];
    match args[0].as_str() {
        "list" => cmd_list(rest),
        "summary" => cmd_summary(rest),
        "kpis" => cmd_kpis(rest),
        "utilization" => cmd_utilization(rest),
        "export-csv" => cmd_export_csv(rest),
        "payroll" => cmd_payroll(rest),
        "timer" => cmd_timer(rest),
        "add-entry" => cmd_add_entry(rest),
        "entry-status" => cmd_entry_status(rest),
        "project" => cmd_project(rest),
        "approval" => cmd_approval(rest),
        "invoice" => cmd_invoice(rest),
        "settings" => cmd_settings(rest),
        "backup" => cmd_backup(rest),
        "sync" => cmd_sync(rest),
        other => Err(format!("Unknown command: {other}\n\n{CLI_HELP}")),
    }
}

pub fn cli_help() -> &'static str {
    CLI_HELP
}

fn cmd_list(args: &[String]) -> Result<(), String> {
    if args.is_empty() || contains_help(args) {
        println!("{LIST_HELP}");
        return Ok(());
    }

    let flags = Flags::parse(&args[1..], &["--range", "--user", "--run"], &[], LIST_HELP)?;
    let services = build_services()?;
    let format = flags.format(&services.config);
    let backend = &services.backend;

    match args[0].as_str() {
        "users" => print_json(&backend.get_users()?, format),
        "projects" => print_json(&backend.get_projects()?, format),
        "clients" => print_json(&backend.get_clients()?, format),
        "categories" => print_json(&backend.get_task_categories()?, format),
        "tasks" => print_json(&backend.get_tasks()?, format),
        "entries" => {
            let mut entries = match flags.value("--user") {
                Some(user) => backend.get_user_entries(user, None)?,
                None => backend.get_time_entries()?,
            };
            if let Some(raw) = flags.value("--range") {
                let range = resolve_range(Some(raw), &services.config)?;
                entries = entries_in_range(&entries, &range);
            }
            let rows = enrich_entries(
                &entries,
                &backend.get_users()?,
                &backend.get_projects()?,
                &backend.get_task_categories()?,
            );
            print_json(&rows, format)
        }
        "approvals" => print_json(&backend.get_approvals()?, format),
        "invoices" => print_json(&backend.get_invoices()?, format),
        "payroll-runs" => print_json(&backend.get_payroll_runs()?, format),
        "payroll-records" => {
            let run = flags.required("--run")?;
            print_json(&backend.get_payroll_records(run)?, format)
        }
        "availability" => print_json(&backend.get_availability()?, format),
        "assignments" => print_json(&backend.get_user_assignments()?, format),
        "notifications" => {
            let user = flags.required("--user")?;
            print_json(&backend.get_notifications(user)?, format)
        }
        "audit" => print_json(&backend.audit_log()?, format),
        other => Err(format!("Unknown collection: {other}\n\n{LIST_HELP}")),
    }
}

fn cmd_summary(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args, &["--week"], &[], "Usage:\n  summary [--week <YYYY-MM-DD>]")?;
    let services = build_services()?;
    let first_day = parse_weekday(&services.settings.get_settings().timesheet.week_start_day)
        .unwrap_or(Weekday::Mon);
    let week_start = match flags.value("--week") {
        Some(raw) => parse_date(raw).ok_or_else(|| format!("Invalid --week: {raw}"))?,
        None => week_start_of(today(), first_day),
    };

    let backend = &services.backend;
    let rows = weekly_summary(&backend.get_time_entries()?, &backend.get_users()?, week_start);
    print_json(&rows, flags.format(&services.config))
}

fn cmd_kpis(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args, &[], &[], "Usage:\n  kpis")?;
    let services = build_services()?;
    let output = KpisOutput {
        approvals: approval_kpis(&services.backend.get_approvals()?),
        invoices: invoice_kpis(&services.backend.get_invoices()?),
    };
    print_json(&output, flags.format(&services.config))
}

fn cmd_utilization(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args, &[], &[], "Usage:\n  utilization")?;
    let services = build_services()?;
    let backend = &services.backend;
    let rows = project_utilization(&backend.get_projects()?, &backend.get_time_entries()?);
    print_json(&rows, flags.format(&services.config))
}

fn cmd_export_csv(args: &[String]) -> Result<(), String> {
    let help = "Usage:\n  export-csv [--range <RANGE>] [--out <FILE> | --save]\n\n--save writes timesheet_<START>_<END>.csv in the current directory.";
    let flags = Flags::parse(args, &["--range", "--out"], &["--save"], help)?;
    let services = build_services()?;
    let backend = &services.backend;

    let range = resolve_range(flags.value("--range"), &services.config)?;
    let entries = entries_in_range(&backend.get_time_entries()?, &range);
    let csv = export_entries_csv(
        &entries,
        &backend.get_users()?,
        &backend.get_projects()?,
        &backend.get_task_categories()?,
    );

    let target = match flags.value("--out") {
        Some(path) => Some(path.to_string()),
        None if flags.switch("--save") => Some(csv_file_name(&range)),
        None => None,
    };
    match target.as_deref() {
        Some(path) => {
            fs::write(path, format!("{csv}\n")).map_err(|e| format!("Could not write {path}: {e}"))?;
            log!("Exported {} entries to {}", entries.len(), path);
            let output = ExportOutput {
                ok: true,
                path: path.to_string(),
                rows: entries.len(),
            };
            print_json(&output, flags.format(&services.config))
        }
        None => {
            println!("{csv}");
            Ok(())
        }
    }
}

fn cmd_payroll(args: &[String]) -> Result<(), String> {
    if args.is_empty() || contains_help(args) {
        println!("{PAYROLL_HELP}");
        return Ok(());
    }

    match args[0].as_str() {
        "run" => {
            let flags = Flags::parse(
                &args[1..],
                &["--range", "--rate"],
                &["--approved-only", "--overtime"],
                PAYROLL_HELP,
            )?;
            let services = build_services()?;
            let payroll = services.settings.get_settings().payroll;
            let mut options = PayrollOptions::from(&payroll);
            if let Some(rate) = flags.number::<f64>("--rate")? {
                options.default_rate = rate;
            }
            if flags.switch("--approved-only") {
                options.approved_only = true;
            }
            if flags.switch("--overtime") {
                options.overtime_threshold_hours = Some(payroll.overtime_threshold_hours);
            }
            let range = resolve_range(flags.value("--range"), &services.config)?;
            let result = services.backend.calculate_payroll(&range, &options)?;
            print_json(&result, flags.format(&services.config))
        }
        "finalize" | "delete" => {
            let flags = Flags::parse(&args[1..], &[], &[], PAYROLL_HELP)?;
            let run_id = flags.positional(0, "RUN_ID")?;
            let services = build_services()?;
            let run = if args[0] == "finalize" {
                services.backend.finalize_payroll_run(run_id)?
            } else {
                services.backend.delete_payroll_run(run_id)?
            };
            print_json(&run, flags.format(&services.config))
        }
        other => Err(format!("Unknown payroll command: {other}\n\n{PAYROLL_HELP}")),
    }
}

fn cmd_timer(args: &[String]) -> Result<(), String> {
    if args.is_empty() || contains_help(args) {
        println!("{TIMER_HELP}");
        return Ok(());
    }

    let flags = Flags::parse(
        &args[1..],
        &["--user", "--project", "--category", "--description", "--billable"],
        &[],
        TIMER_HELP,
    )?;
    let user = flags.required("--user")?;
    let services = build_services()?;
    let backend = &services.backend;
    let format = flags.format(&services.config);

    match args[0].as_str() {
        "start" => {
            let project = flags.required("--project")?;
            let category = flags.value("--category");
            let billable = match flags.value("--billable") {
                Some(raw) => parse_bool(raw).ok_or_else(|| format!("Invalid value for --billable: {raw}"))?,
                None => default_billable(backend, category)?,
            };
            let timer = backend.start_timer(
                user,
                project,
                category,
                flags.value("--description").unwrap_or_default(),
                billable,
            )?;
            print_json(&timer, format)
        }
        "pause" => print_json(&backend.pause_timer(user)?, format),
        "resume" => print_json(&backend.resume_timer(user)?, format),
        "stop" => print_json(&backend.stop_timer(user)?, format),
        "note" => print_json(
            &backend.describe_timer(user, flags.required("--description")?)?,
            format,
        ),
        "discard" => {
            backend.discard_timer(user)?;
            print_json(&serde_json::json!({ "ok": true }), format)
        }
        "status" => {
            let timer = backend.get_active_timer(user)?;
            let output = TimerStatusOutput {
                state: timer.state_label(),
                elapsed_seconds: timer.elapsed_seconds(backend.now()),
                timer,
            };
            print_json(&output, format)
        }
        other => Err(format!("Unknown timer command: {other}\n\n{TIMER_HELP}")),
    }
}

fn cmd_add_entry(args: &[String]) -> Result<(), String> {
    if contains_help(args) {
        println!("{ADD_ENTRY_HELP}");
        return Ok(());
    }

    let flags = Flags::parse(
        args,
        &[
            "--user",
            "--project",
            "--minutes",
            "--date",
            "--category",
            "--description",
            "--billable",
        ],
        &[],
        ADD_ENTRY_HELP,
    )?;
    let minutes = flags
        .number::<i64>("--minutes")?
        .ok_or_else(|| "Missing --minutes".to_string())?;
    if minutes <= 0 {
        return Err("minutes must be greater than 0".to_string());
    }

    let services = build_services()?;
    let backend = &services.backend;
    let category = flags.value("--category");
    let is_billable = match flags.value("--billable") {
        Some(raw) => parse_bool(raw).ok_or_else(|| format!("Invalid value for --billable: {raw}"))?,
        None => default_billable(backend, category)?,
    };
    let date = match flags.value("--date") {
        Some(raw) => raw.to_string(),
        None => today().format("%Y-%m-%d").to_string(),
    };

    let entry = backend.add_time_entry(TimeEntry {
        id: String::new(),
        user_id: flags.required("--user")?.to_string(),
        project_id: flags.required("--project")?.to_string(),
        category_id: category.map(str::to_string),
        date,
        start_time: None,
        end_time: None,
        duration_minutes: minutes,
        is_billable,
        status: EntryStatus::Draft,
        description: flags.value("--description").unwrap_or_default().to_string(),
    })?;
    print_json(&entry, flags.format(&services.config))
}

fn cmd_entry_status(args: &[String]) -> Result<(), String> {
    let help = "Usage:\n  entry-status <ENTRY_ID> <DRAFT|SUBMITTED|APPROVED|REJECTED|LOCKED>";
    if contains_help(args) {
        println!("{help}");
        return Ok(());
    }
    let flags = Flags::parse(args, &[], &[], help)?;
    let id = flags.positional(0, "ENTRY_ID")?;
    let raw = flags.positional(1, "STATUS")?;
    let status: EntryStatus = serde_json::from_value(Value::String(raw.trim().to_uppercase()))
        .map_err(|_| format!("Unknown entry status: {raw}"))?;

    let services = build_services()?;
    let entry = services.backend.set_entry_status(id, status)?;
    print_json(&entry, flags.format(&services.config))
}

fn cmd_project(args: &[String]) -> Result<(), String> {
    let help = "Usage:\n  project archive <PROJECT_ID>\n  project restore <PROJECT_ID>";
    if args.is_empty() || contains_help(args) {
        println!("{help}");
        return Ok(());
    }
    let flags = Flags::parse(&args[1..], &[], &[], help)?;
    let id = flags.positional(0, "PROJECT_ID")?;
    let services = build_services()?;
    let project = match args[0].as_str() {
        "archive" => services.backend.delete_project(id)?,
        "restore" => services.backend.restore_project(id)?,
        other => return Err(format!("Unknown project command: {other}\n\n{help}")),
    };
    print_json(&project, flags.format(&services.config))
}

fn cmd_approval(args: &[String]) -> Result<(), String> {
    if args.is_empty() || contains_help(args) {
        println!("{APPROVAL_HELP}");
        return Ok(());
    }

    let flags = Flags::parse(
        &args[1..],
        &["--user", "--week", "--comment", "--grace"],
        &[],
        APPROVAL_HELP,
    )?;
    let services = build_services()?;
    let backend = &services.backend;
    let format = flags.format(&services.config);

    match args[0].as_str() {
        "submit" => {
            let approval = backend.submit_week(flags.required("--user")?, flags.required("--week")?)?;
            print_json(&approval, format)
        }
        "approve" => print_json(&backend.approve_request(flags.positional(0, "ID")?)?, format),
        "reject" => {
            let approval = backend.reject_request(flags.positional(0, "ID")?, flags.required("--comment")?)?;
            print_json(&approval, format)
        }
        "flag-overdue" => {
            let grace = flags.number::<i64>("--grace")?.unwrap_or(3);
            let output = CountOutput {
                action: "flag-overdue-approvals",
                count: backend.flag_overdue_approvals(today(), grace)?,
            };
            print_json(&output, format)
        }
        other => Err(format!("Unknown approval command: {other}\n\n{APPROVAL_HELP}")),
    }
}

fn cmd_invoice(args: &[String]) -> Result<(), String> {
    if args.is_empty() || contains_help(args) {
        println!("{INVOICE_HELP}");
        return Ok(());
    }

    let flags = Flags::parse(
        &args[1..],
        &[
            "--amount",
            "--date",
            "--method",
            "--reference",
            "--project",
            "--range",
            "--tax",
            "--terms",
        ],
        &[],
        INVOICE_HELP,
    )?;
    let services = build_services()?;
    let backend = &services.backend;
    let format = flags.format(&services.config);

    match args[0].as_str() {
        "pay" => {
            let amount = flags
                .number::<f64>("--amount")?
                .ok_or_else(|| "Missing --amount".to_string())?;
            let payment = PaymentRecord {
                id: String::new(),
                date: flags
                    .value("--date")
                    .map(str::to_string)
                    .unwrap_or_else(|| today().format("%Y-%m-%d").to_string()),
                amount,
                method: flags.value("--method").unwrap_or("BANK_TRANSFER").to_string(),
                reference: flags.value("--reference").unwrap_or_default().to_string(),
            };
            print_json(&backend.record_payment(flags.positional(0, "ID")?, payment)?, format)
        }
        "from-entries" => {
            let mut terms = InvoiceTerms::from(&services.settings.get_settings().billing);
            if let Some(tax) = flags.number::<f64>("--tax")? {
                terms.tax_rate = tax;
            }
            if let Some(days) = flags.number::<i64>("--terms")? {
                terms.payment_terms_days = days;
            }
            let range = resolve_range(flags.value("--range"), &services.config)?;
            let invoice = backend.create_invoice_from_entries(flags.required("--project")?, &range, &terms)?;
            print_json(&invoice, format)
        }
        "cancel" => print_json(&backend.cancel_invoice(flags.positional(0, "ID")?)?, format),
        "flag-overdue" => {
            let output = CountOutput {
                action: "flag-overdue-invoices",
                count: backend.flag_overdue_invoices(today())?,
            };
            print_json(&output, format)
        }
        other => Err(format!("Unknown invoice command: {other}\n\n{INVOICE_HELP}")),
    }
}

fn cmd_settings(args: &[String]) -> Result<(), String> {
    if args.is_empty() || contains_help(args) {
        println!("{SETTINGS_HELP}");
        return Ok(());
    }

    let flags = Flags::parse(&args[1..], &["--section"], &[], SETTINGS_HELP)?;
    let services = build_services()?;
    let format = flags.format(&services.config);

    match args[0].as_str() {
        "get" => {
            let settings = services.settings.get_settings();
            match flags.value("--section") {
                Some(raw) => {
                    let section: SettingsSection = raw.parse()?;
                    let document = serde_json::to_value(&settings).map_err(|e| e.to_string())?;
                    let value = document.get(section.key()).cloned().unwrap_or(Value::Null);
                    print_json(&value, format)
                }
                None => print_json(&settings, format),
            }
        }
        "set-section" => {
            let section: SettingsSection = flags.positional(0, "NAME")?.parse()?;
            let raw = flags.positional(1, "JSON")?;
            let partial: Value = serde_json::from_str(raw).map_err(|e| format!("Invalid JSON: {e}"))?;
            let saved = services.settings.update_section(section, &partial)?;
            if !saved.synced {
                log!("Settings section {} saved locally only", section);
            }
            print_json(&saved, format)
        }
        other => Err(format!("Unknown settings command: {other}\n\n{SETTINGS_HELP}")),
    }
}

fn cmd_backup(args: &[String]) -> Result<(), String> {
    if args.is_empty() || contains_help(args) {
        println!("{BACKUP_HELP}");
        return Ok(());
    }

    let flags = Flags::parse(&args[1..], &["--out"], &[], BACKUP_HELP)?;
    let services = build_services()?;
    let format = flags.format(&services.config);

    match args[0].as_str() {
        "create" => {
            let snapshot = services.backend.create_backup()?;
            services.settings.record_backup(snapshot.created_at)?;
            let path = match flags.value("--out") {
                Some(path) => {
                    let text = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
                    fs::write(path, text).map_err(|e| format!("Could not write {path}: {e}"))?;
                    Some(path.to_string())
                }
                None => None,
            };
            if path.is_none() {
                return print_json(&snapshot, format);
            }
            let output = BackupOutput {
                created_at: snapshot.created_at.to_rfc3339(),
                keys: snapshot.data.len(),
                path,
            };
            print_json(&output, format)
        }
        "restore" => {
            let path = flags.positional(0, "FILE")?;
            let text = fs::read_to_string(path).map_err(|e| format!("Could not read {path}: {e}"))?;
            let snapshot: BackupSnapshot =
                serde_json::from_str(&text).map_err(|e| format!("Invalid backup file: {e}"))?;
            let output = CountOutput {
                action: "restore",
                count: services.backend.restore_backup(&snapshot)?,
            };
            print_json(&output, format)
        }
        "due" => {
            let backup = services.settings.get_settings().backup;
            let output = serde_json::json!({
                "due": backup_due(&backup, Utc::now()),
                "lastBackupAt": backup.last_backup_at,
                "frequencyHours": backup.frequency_hours,
            });
            print_json(&output, format)
        }
        other => Err(format!("Unknown backup command: {other}\n\n{BACKUP_HELP}")),
    }
}

fn cmd_sync(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args, &[], &[], "Usage:\n  sync")?;
    let services = build_services()?;
    let client = build_client(&services.config)?
        .ok_or_else(|| "No base URL configured. Set CREDENCE_BASE_URL or base_url in the config.".to_string())?;
    let backend = &services.backend;

    let output = SyncOutput {
        users: backend.replace_all(client.fetch_list::<User>("/users")?)?,
        clients: backend.replace_all(client.fetch_list::<Client>("/clients")?)?,
        projects: backend.replace_all(client.fetch_list::<Project>("/projects")?)?,
        task_categories: backend.replace_all(client.fetch_list::<TaskCategory>("/task-categories")?)?,
        user_assignments: backend.replace_all(client.fetch_list::<UserAssignment>("/user-assignments")?)?,
    };
    backend.recompute_rollups()?;
    print_json(&output, flags.format(&services.config))
}

fn build_services() -> Result<Services, String> {
    let config = load_config();
    let data_dir = resolve_data_dir(&config);
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(data_dir)?);
    let remote = build_client(&config)?.map(|client| Box::new(client) as Box<dyn SettingsRemote>);

    Ok(Services {
        backend: Backend::new(store.clone()),
        settings: SettingsStore::new(store, remote),
        config,
    })
}

/// `None` when no server is configured; the crate then works offline.
fn build_client(config: &AppConfig) -> Result<Option<ApiClient>, String> {
    if config.base_url.is_empty() {
        return Ok(None);
    }
    Ok(Some(ApiClient::new(config.base_url.clone(), config.api_token.clone())?))
}

fn resolve_range(input: Option<&str>, config: &AppConfig) -> Result<DateRange, String> {
    let raw = input
        .map(str::to_string)
        .or_else(|| config.default_date_range.clone())
        .unwrap_or_else(|| "MONTH".to_string());

    parse_date_range(&raw, today()).map_err(|error| format!("Invalid range ({raw}), expected {RANGE_ARG}: {error}"))
}

fn default_billable(backend: &Backend, category: Option<&str>) -> Result<bool, String> {
    match category {
        Some(id) => Ok(backend.get_task_category(id)?.is_billable),
        None => Ok(true),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

struct Flags {
    values: HashMap<String, String>,
    switches: HashSet<String>,
    positionals: Vec<String>,
    format: Option<OutputFormat>,
}

impl Flags {
    fn parse(args: &[String], valued: &[&str], switches: &[&str], help_text: &str) -> Result<Flags, String> {
        let mut flags = Flags {
            values: HashMap::new(),
            switches: HashSet::new(),
            positionals: Vec::new(),
            format: None,
        };

        let mut i = 0usize;
        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "--pretty" => flags.format = Some(OutputFormat::Pretty),
                "--toon" => flags.format = Some(OutputFormat::Toon),
                _ if valued.contains(&arg) => {
                    i += 1;
                    let value = args.get(i).ok_or_else(|| format!("Missing value for {arg}"))?;
                    flags.values.insert(arg.to_string(), value.clone());
                }
                _ if switches.contains(&arg) => {
                    flags.switches.insert(arg.to_string());
                }
                unknown if unknown.starts_with("--") => {
                    return Err(format!("Unknown flag: {unknown}\n\n{help_text}"));
                }
                positional => flags.positionals.push(positional.to_string()),
            }
            i += 1;
        }

        Ok(flags)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<&str, String> {
        self.value(name).ok_or_else(|| format!("Missing {name}"))
    }

    fn switch(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    fn positional(&self, index: usize, label: &str) -> Result<&str, String> {
        self.positionals
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| format!("Missing <{label}>"))
    }

    fn number<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, String> {
        match self.value(name) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| format!("Invalid value for {name}: {raw}")),
            None => Ok(None),
        }
    }

    fn format(&self, config: &AppConfig) -> OutputFormat {
        match self.format {
            Some(format) => format,
            None if config.pretty_output => OutputFormat::Pretty,
            None => OutputFormat::Compact,
        }
    }
}

fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), String> {
    let text = match format {
        OutputFormat::Compact => serde_json::to_string(value).map_err(|error| error.to_string())?,
        OutputFormat::Pretty => serde_json::to_string_pretty(value).map_err(|error| error.to_string())?,
        OutputFormat::Toon => {
            let value = serde_json::to_value(value).map_err(|error| error.to_string())?;
            encode_toon_compact(&value)
        }
    };
    println!("{text}");
    Ok(())
}

fn encode_toon_compact(value: &Value) -> String {
    let mut options = EncodeOptions::default();
    options.indent = 1;
    options.delimiter = Delimiter::Tab;
    toon::encode(value, Some(options))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn is_help(value: &str) -> bool {
    matches!(value, "-h" | "--help" | "help")
}

fn contains_help(args: &[String]) -> bool {
    args.iter().any(|value| is_help(value.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn flags_split_values_switches_and_positionals() {
        let parsed = Flags::parse(
            &args(&["inv-1", "--amount", "250.5", "--approved-only", "--toon"]),
            &["--amount"],
            &["--approved-only"],
            INVOICE_HELP,
        )
        .unwrap();
        assert_eq!(parsed.positional(0, "ID").unwrap(), "inv-1");
        assert_eq!(parsed.number::<f64>("--amount").unwrap(), Some(250.5));
        assert!(parsed.switch("--approved-only"));
        assert_eq!(parsed.format(&AppConfig::default()), OutputFormat::Toon);
    }

    #[test]
    fn unknown_flags_and_missing_values_fail() {
        assert!(Flags::parse(&args(&["--nope"]), &[], &[], "").is_err());
        assert!(Flags::parse(&args(&["--amount"]), &["--amount"], &[], "").is_err());
        let parsed = Flags::parse(&args(&["--amount", "lots"]), &["--amount"], &[], "").unwrap();
        assert!(parsed.number::<f64>("--amount").is_err());
    }

    #[test]
    fn config_sets_default_output() {
        let parsed = Flags::parse(&[], &[], &[], "").unwrap();
        let config = AppConfig {
            pretty_output: true,
            ..AppConfig::default()
        };
        assert_eq!(parsed.format(&config), OutputFormat::Pretty);
        assert_eq!(parsed.format(&AppConfig::default()), OutputFormat::Compact);
    }

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
